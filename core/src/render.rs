//! Renders a [`Criteria`] to SQL text through the mapping metadata.

use compact_str::{CompactString, format_compact};
use hashbrown::HashMap;

use crate::criteria::{Criteria, FetchMode, JoinKind, ProjectionItem, ROOT_ALIAS, ResultTransform};
use crate::criterion::{CompareOp, Criterion, Order, SortDirection};
use crate::error::{GraphFetchError, Result};
use crate::metadata::{AssociationKind, EntityMapping, Metadata};
use crate::sql::{SQL, Token};
use crate::value::{Key, Value};

/// Alias used for the derived table of a grouped count.
pub const COUNT_TEMP_ALIAS: &str = "countTemp";

const LOAD_ALIAS: &str = "t";

/// `SELECT COUNT(*) FROM (<inner>) AS "countTemp"`
///
/// Parameters of `inner` are carried over in order.
pub fn count_of_subquery(inner: SQL) -> SQL {
    SQL::token(Token::SELECT)
        .append(SQL::func("COUNT", SQL::token(Token::STAR)))
        .push(Token::FROM)
        .append(inner.parens())
        .push(Token::AS)
        .append(SQL::ident(COUNT_TEMP_ALIAS))
}

/// Alias → entity mapping for one query.
struct Scope<'m> {
    aliases: HashMap<CompactString, &'m EntityMapping>,
}

impl<'m> Scope<'m> {
    fn mapping(&self, alias: &str) -> Result<&'m EntityMapping> {
        self.aliases
            .get(alias)
            .copied()
            .ok_or_else(|| GraphFetchError::UnknownAlias(CompactString::from(alias)))
    }

    /// Resolves `"alias.property"` or a bare root `"property"` to a column reference.
    fn column(&self, property: &str) -> Result<SQL> {
        let (alias, property) = property.split_once('.').unwrap_or((ROOT_ALIAS, property));
        let mapping = self.mapping(alias)?;
        Ok(SQL::qualified(alias, mapping.column_of(property)))
    }

    fn identifier(&self, alias: &str) -> Result<SQL> {
        let mapping = self.mapping(alias)?;
        Ok(SQL::qualified(alias, mapping.identifier_column()))
    }
}

pub struct Renderer<'m, M: Metadata + ?Sized> {
    metadata: &'m M,
}

impl<'m, M: Metadata + ?Sized> Renderer<'m, M> {
    pub fn new(metadata: &'m M) -> Self {
        Self { metadata }
    }

    fn entity(&self, name: &str) -> Result<&'m EntityMapping> {
        self.metadata
            .entity(name)
            .ok_or_else(|| GraphFetchError::Mapping(format!("no mapping for entity `{name}`")))
    }

    /// Renders the full statement: projection or root columns, joins,
    /// restrictions, grouping, orders and pagination.
    ///
    /// A paged distinct-root query over joins pages root identities in a
    /// subquery, so a page holds whole roots rather than joined rows.
    pub fn render(&self, criteria: &Criteria) -> Result<SQL> {
        let root = self.entity(criteria.entity())?;
        let (scope, joins) = self.resolve_joins(root, criteria)?;
        let mut conditions = self.conditions(&scope, criteria)?;

        let paged_roots = criteria.projection().is_none()
            && criteria.result_transform() == ResultTransform::DistinctRoot
            && !joins.is_empty()
            && (criteria.max_results().is_some() || criteria.first_result().is_some());
        if paged_roots {
            let root_id = scope.identifier(ROOT_ALIAS)?;
            let mut page = SQL::token(Token::SELECT)
                .append(root_id.clone())
                .append(Self::from_clause(root, joins.clone()));
            page.append_mut(Self::where_clause(conditions.clone()));
            page.push_mut(Token::GROUP);
            page.push_mut(Token::BY);
            page.append_mut(root_id.clone());
            page.append_mut(self.order_clause(&scope, criteria)?);
            page.append_mut(Self::paging_clause(criteria));
            conditions.push(root_id.push(Token::IN).append(page.parens()));
        }

        let mut sql = SQL::token(Token::SELECT);
        let mut counting = false;
        match criteria.projection() {
            None => sql.append_mut(SQL::ident(ROOT_ALIAS).push(Token::DOT).push(Token::STAR)),
            Some(projection) => {
                let mut group_index = 0usize;
                let mut items = Vec::with_capacity(projection.len());
                for item in projection.items() {
                    match item {
                        ProjectionItem::RowCount => {
                            counting = true;
                            items.push(self.row_count(&scope, criteria)?);
                        }
                        ProjectionItem::GroupProperty(property) => {
                            items.push(
                                scope
                                    .column(property)?
                                    .push(Token::AS)
                                    .append(SQL::ident(format_compact!("g{group_index}"))),
                            );
                            group_index += 1;
                        }
                    }
                }
                sql.append_mut(SQL::join(items, Token::COMMA));
            }
        }

        sql.append_mut(Self::from_clause(root, joins));
        sql.append_mut(Self::where_clause(conditions));

        if let Some(projection) = criteria.projection() {
            let groups = projection
                .group_properties()
                .map(|p| scope.column(p))
                .collect::<Result<Vec<_>>>()?;
            if !groups.is_empty() {
                sql.push_mut(Token::GROUP);
                sql.push_mut(Token::BY);
                sql.append_mut(SQL::join(groups, Token::COMMA));
            }
        }

        if !counting {
            sql.append_mut(self.order_clause(&scope, criteria)?);
            if !paged_roots {
                sql.append_mut(Self::paging_clause(criteria));
            }
        }

        Ok(sql)
    }

    fn from_clause(root: &EntityMapping, joins: SQL) -> SQL {
        SQL::token(Token::FROM)
            .append(SQL::ident(root.table()))
            .push(Token::AS)
            .append(SQL::ident(ROOT_ALIAS))
            .append(joins)
    }

    fn conditions(&self, scope: &Scope<'m>, criteria: &Criteria) -> Result<Vec<SQL>> {
        criteria
            .restrictions()
            .iter()
            .map(|c| self.criterion(scope, c))
            .collect()
    }

    fn where_clause(conditions: Vec<SQL>) -> SQL {
        if conditions.is_empty() {
            return SQL::empty();
        }
        SQL::token(Token::WHERE).append(SQL::join(conditions, Token::AND))
    }

    fn order_clause(&self, scope: &Scope<'m>, criteria: &Criteria) -> Result<SQL> {
        if criteria.orders().is_empty() {
            return Ok(SQL::empty());
        }
        let orders = criteria
            .orders()
            .iter()
            .map(|o| self.order(scope, o))
            .collect::<Result<Vec<_>>>()?;
        Ok(SQL::token(Token::ORDER)
            .push(Token::BY)
            .append(SQL::join(orders, Token::COMMA)))
    }

    fn paging_clause(criteria: &Criteria) -> SQL {
        let mut sql = SQL::empty();
        match (criteria.max_results(), criteria.first_result()) {
            (Some(max), first) => {
                sql.push_mut(Token::LIMIT);
                sql.append_mut(SQL::number(u64::from(max)));
                if let Some(first) = first {
                    sql.push_mut(Token::OFFSET);
                    sql.append_mut(SQL::number(u64::from(first)));
                }
            }
            (None, Some(first)) => {
                // SQLite needs a LIMIT before OFFSET
                sql.push_mut(Token::LIMIT);
                sql.append_mut(SQL::raw("-1"));
                sql.push_mut(Token::OFFSET);
                sql.append_mut(SQL::number(u64::from(first)));
            }
            (None, None) => {}
        }
        sql
    }

    /// Renders the statement loading one association of the owner identified
    /// by `key`: the owner's identifier for one-to-many, the foreign-key value
    /// for many-to-one.
    pub fn association_load(&self, owner: &str, association: &str, key: &Key) -> Result<SQL> {
        let owner_mapping = self.entity(owner)?;
        let assoc = owner_mapping.association(association).ok_or_else(|| {
            GraphFetchError::Mapping(format!("`{owner}` has no association `{association}`"))
        })?;
        let target = self.entity(&assoc.target)?;
        let column = match &assoc.kind {
            AssociationKind::OneToMany { foreign_key } => foreign_key.as_str(),
            AssociationKind::ManyToOne { .. } => target.identifier_column(),
        };
        let mut sql = SQL::token(Token::SELECT)
            .append(SQL::ident(LOAD_ALIAS).push(Token::DOT).push(Token::STAR))
            .push(Token::FROM)
            .append(SQL::ident(target.table()))
            .push(Token::AS)
            .append(SQL::ident(LOAD_ALIAS))
            .push(Token::WHERE)
            .append(SQL::qualified(LOAD_ALIAS, column))
            .push(Token::EQ)
            .append(SQL::param(Value::from(key)));
        if assoc.is_collection() {
            sql = sql
                .push(Token::ORDER)
                .push(Token::BY)
                .append(SQL::qualified(LOAD_ALIAS, target.identifier_column()));
        }
        Ok(sql)
    }

    fn resolve_joins(&self, root: &'m EntityMapping, criteria: &Criteria) -> Result<(Scope<'m>, SQL)> {
        let mut scope = Scope {
            aliases: HashMap::with_capacity(criteria.joins().len() + 1),
        };
        scope.aliases.insert(CompactString::const_new(ROOT_ALIAS), root);

        // Select-mode joins are only rendered when a predicate, order,
        // grouping or a rendered join below them reads their alias.
        let joins = criteria.joins();
        let mut needed = criteria.referenced_aliases();
        let mut keep = vec![false; joins.len()];
        for (index, join) in joins.iter().enumerate().rev() {
            if criteria.join_fetch_mode(join) == FetchMode::Join
                || needed.contains(join.alias.as_str())
            {
                keep[index] = true;
                needed.insert(join.owner.as_str());
            }
        }

        let mut sql = SQL::empty();
        for (join, _) in joins.iter().zip(keep).filter(|(_, keep)| *keep) {
            let owner = scope.mapping(&join.owner)?;
            let assoc = owner.association(&join.association).ok_or_else(|| {
                GraphFetchError::Mapping(format!(
                    "`{}` has no association `{}`",
                    owner.name(),
                    join.association
                ))
            })?;
            let target = self.entity(&assoc.target)?;

            let (left, right) = match &assoc.kind {
                AssociationKind::ManyToOne { foreign_key } => (
                    SQL::qualified(&join.alias, target.identifier_column()),
                    SQL::qualified(&join.owner, foreign_key),
                ),
                AssociationKind::OneToMany { foreign_key } => (
                    SQL::qualified(&join.alias, foreign_key),
                    SQL::qualified(&join.owner, owner.identifier_column()),
                ),
            };

            sql.push_mut(match join.kind {
                JoinKind::Inner => Token::INNER,
                JoinKind::Left => Token::LEFT,
            });
            sql.push_mut(Token::JOIN);
            sql.append_mut(SQL::ident(target.table()));
            sql.push_mut(Token::AS);
            sql.append_mut(SQL::ident(join.alias.clone()));
            sql.push_mut(Token::ON);
            sql.append_mut(left.push(Token::EQ).append(right));

            scope.aliases.insert(join.alias.clone(), target);
        }
        Ok((scope, sql))
    }

    fn row_count(&self, scope: &Scope<'m>, criteria: &Criteria) -> Result<SQL> {
        let args = match criteria.result_transform() {
            ResultTransform::DistinctRoot => {
                SQL::token(Token::DISTINCT).append(scope.identifier(ROOT_ALIAS)?)
            }
            ResultTransform::PassThrough => SQL::token(Token::STAR),
        };
        Ok(SQL::func("COUNT", args))
    }

    fn order(&self, scope: &Scope<'m>, order: &Order) -> Result<SQL> {
        Ok(scope.column(&order.property)?.push(match order.direction {
            SortDirection::Asc => Token::ASC,
            SortDirection::Desc => Token::DESC,
        }))
    }

    fn criterion(&self, scope: &Scope<'m>, criterion: &Criterion) -> Result<SQL> {
        let sql = match criterion {
            Criterion::Compare {
                property,
                op,
                value,
            } => scope
                .column(property)?
                .push(match op {
                    CompareOp::Eq => Token::EQ,
                    CompareOp::Ne => Token::NE,
                    CompareOp::Lt => Token::LT,
                    CompareOp::Le => Token::LE,
                    CompareOp::Gt => Token::GT,
                    CompareOp::Ge => Token::GE,
                })
                .append(SQL::param(value.clone())),
            Criterion::Like { property, pattern } => scope
                .column(property)?
                .push(Token::LIKE)
                .append(SQL::param(pattern.clone())),
            Criterion::IsNull(property) => {
                scope.column(property)?.push(Token::IS).push(Token::NULL)
            }
            Criterion::IsNotNull(property) => scope
                .column(property)?
                .push(Token::IS)
                .push(Token::NOT)
                .push(Token::NULL),
            Criterion::In { property, values } => {
                if values.is_empty() {
                    SQL::raw("1 = 0")
                } else {
                    let values = values.iter().cloned().map(SQL::param);
                    scope
                        .column(property)?
                        .push(Token::IN)
                        .append(SQL::join(values, Token::COMMA).parens())
                }
            }
            Criterion::Between {
                property,
                low,
                high,
            } => scope
                .column(property)?
                .push(Token::BETWEEN)
                .append(SQL::param(low.clone()))
                .push(Token::AND)
                .append(SQL::param(high.clone())),
            Criterion::IdEq { scope: alias, key } => scope
                .identifier(alias.as_deref().unwrap_or(ROOT_ALIAS))?
                .push(Token::EQ)
                .append(SQL::param(Value::from(key))),
            Criterion::And(items) => self.junction(scope, items, Token::AND, "1 = 1")?,
            Criterion::Or(items) => self.junction(scope, items, Token::OR, "1 = 0")?,
            Criterion::Not(inner) => SQL::token(Token::NOT).append(self.criterion(scope, inner)?.parens()),
        };
        Ok(sql)
    }

    fn junction(
        &self,
        scope: &Scope<'m>,
        items: &[Criterion],
        separator: Token,
        empty: &'static str,
    ) -> Result<SQL> {
        if items.is_empty() {
            return Ok(SQL::raw(empty));
        }
        let parts = items
            .iter()
            .map(|c| self.criterion(scope, c))
            .collect::<Result<Vec<_>>>()?;
        Ok(SQL::join(parts, separator).parens())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{FetchMode, ProjectionList, ResultTransform};
    use crate::criterion::{and, eq, id_eq, in_list, is_null, not, or};
    use crate::metadata::MetadataRegistry;

    fn metadata() -> MetadataRegistry {
        MetadataRegistry::builder()
            .entity(
                EntityMapping::new("Customer", "customers")
                    .column("name", "full_name")
                    .one_to_many("orders", "Order", "customer_id"),
            )
            .entity(
                EntityMapping::new("Order", "orders")
                    .many_to_one("customer", "Customer", "customer_id")
                    .one_to_many("items", "LineItem", "order_id"),
            )
            .entity(EntityMapping::new("LineItem", "line_items"))
            .build()
    }

    #[test]
    fn renders_joins_filters_orders_and_paging() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Customer");
        criteria
            .create_alias("this.orders", "o", JoinKind::Left)
            .unwrap()
            .create_alias("o.items", "i", JoinKind::Inner)
            .unwrap();
        criteria
            .add(eq("name", "Ada"))
            .add(is_null("o.shipped_at"))
            .add_order(Order::desc("o.id"))
            .set_first_result(10)
            .set_max_results(5);

        let rendered = Renderer::new(&metadata).render(&criteria).unwrap();
        let (text, params) = rendered.build();
        assert_eq!(
            text,
            "SELECT \"this\".* FROM \"customers\" AS \"this\" \
             LEFT JOIN \"orders\" AS \"o\" ON \"o\".\"customer_id\" = \"this\".\"id\" \
             INNER JOIN \"line_items\" AS \"i\" ON \"i\".\"order_id\" = \"o\".\"id\" \
             WHERE \"this\".\"full_name\" = ? AND \"o\".\"shipped_at\" IS NULL \
             ORDER BY \"o\".\"id\" DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(params, vec![&Value::from("Ada")]);
    }

    #[test]
    fn many_to_one_join_uses_owner_foreign_key() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Order");
        criteria
            .create_alias("customer", "c", JoinKind::Inner)
            .unwrap();
        let text = Renderer::new(&metadata).render(&criteria).unwrap().sql();
        assert!(text.contains(
            "INNER JOIN \"customers\" AS \"c\" ON \"c\".\"id\" = \"this\".\"customer_id\""
        ));
    }

    #[test]
    fn distinct_root_paging_over_joins_pages_root_identities() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Customer");
        criteria
            .create_alias("orders", "o", JoinKind::Left)
            .unwrap();
        criteria
            .add(eq("o.status", "OPEN"))
            .add_order(Order::asc("name"))
            .set_first_result(10)
            .set_max_results(5)
            .set_result_transform(ResultTransform::DistinctRoot);

        let rendered = Renderer::new(&metadata).render(&criteria).unwrap();
        let (text, params) = rendered.build();
        assert_eq!(
            text,
            "SELECT \"this\".* FROM \"customers\" AS \"this\" \
             LEFT JOIN \"orders\" AS \"o\" ON \"o\".\"customer_id\" = \"this\".\"id\" \
             WHERE \"o\".\"status\" = ? AND \"this\".\"id\" IN (SELECT \"this\".\"id\" \
             FROM \"customers\" AS \"this\" \
             LEFT JOIN \"orders\" AS \"o\" ON \"o\".\"customer_id\" = \"this\".\"id\" \
             WHERE \"o\".\"status\" = ? GROUP BY \"this\".\"id\" \
             ORDER BY \"this\".\"full_name\" ASC LIMIT 5 OFFSET 10) \
             ORDER BY \"this\".\"full_name\" ASC"
        );
        assert_eq!(params, vec![&Value::from("OPEN"), &Value::from("OPEN")]);

        // Without joins a row is a root, so plain LIMIT/OFFSET stays.
        let mut criteria = Criteria::new("Customer");
        criteria
            .set_max_results(5)
            .set_result_transform(ResultTransform::DistinctRoot);
        let text = Renderer::new(&metadata).render(&criteria).unwrap().sql();
        assert_eq!(text, "SELECT \"this\".* FROM \"customers\" AS \"this\" LIMIT 5");
    }

    #[test]
    fn select_mode_joins_render_only_when_referenced() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Customer");
        criteria
            .create_alias("orders", "o", JoinKind::Left)
            .unwrap()
            .create_alias("o.items", "i", JoinKind::Left)
            .unwrap();
        criteria
            .set_fetch_mode("orders", FetchMode::Select)
            .set_fetch_mode("o.items", FetchMode::Select);
        let text = Renderer::new(&metadata).render(&criteria).unwrap().sql();
        assert_eq!(text, "SELECT \"this\".* FROM \"customers\" AS \"this\"");

        // A predicate on the leaf keeps both the leaf and its owner.
        criteria.add(is_null("i.sku"));
        let text = Renderer::new(&metadata).render(&criteria).unwrap().sql();
        assert!(text.contains("LEFT JOIN \"orders\" AS \"o\""), "{text}");
        assert!(text.contains("LEFT JOIN \"line_items\" AS \"i\""), "{text}");
    }

    #[test]
    fn offset_without_limit() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Customer");
        criteria.set_first_result(3);
        let text = Renderer::new(&metadata).render(&criteria).unwrap().sql();
        assert!(text.ends_with("LIMIT -1 OFFSET 3"), "{text}");
    }

    #[test]
    fn row_count_ignores_orders_and_paging() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Customer");
        criteria
            .add_order(Order::asc("name"))
            .set_max_results(10)
            .set_result_transform(ResultTransform::DistinctRoot)
            .set_projection(ProjectionList::row_count());
        let text = Renderer::new(&metadata).render(&criteria).unwrap().sql();
        assert_eq!(
            text,
            "SELECT COUNT(DISTINCT \"this\".\"id\") FROM \"customers\" AS \"this\""
        );
    }

    #[test]
    fn grouped_count_wraps_rendered_statement() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Customer");
        criteria
            .create_alias("orders", "o", JoinKind::Left)
            .unwrap();
        criteria
            .add(eq("o.status", "OPEN"))
            .set_projection(ProjectionList::group_by(["this.id", "o.status"]));
        let inner = Renderer::new(&metadata).render(&criteria).unwrap();
        let rendered = count_of_subquery(inner);
        let (text, params) = rendered.build();
        assert_eq!(
            text,
            "SELECT COUNT(*) FROM (SELECT \"this\".\"id\" AS \"g0\", \"o\".\"status\" AS \"g1\" \
             FROM \"customers\" AS \"this\" \
             LEFT JOIN \"orders\" AS \"o\" ON \"o\".\"customer_id\" = \"this\".\"id\" \
             WHERE \"o\".\"status\" = ? \
             GROUP BY \"this\".\"id\", \"o\".\"status\") AS \"countTemp\""
        );
        assert_eq!(params, vec![&Value::from("OPEN")]);
    }

    #[test]
    fn junctions_and_identifier() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Customer");
        criteria.add(or([
            and([id_eq(1_i64), not(in_list("name", ["a", "b"]))]),
            and([]),
        ]));
        let rendered = Renderer::new(&metadata).render(&criteria).unwrap();
        let (text, params) = rendered.build();
        assert!(text.ends_with(
            "WHERE ((\"this\".\"id\" = ? AND NOT (\"this\".\"full_name\" IN (?, ?))) OR 1 = 1)"
        ), "{text}");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn unknown_alias_is_an_error() {
        let metadata = metadata();
        let mut criteria = Criteria::new("Customer");
        criteria.add(eq("nope.status", "OPEN"));
        assert!(matches!(
            Renderer::new(&metadata).render(&criteria),
            Err(GraphFetchError::UnknownAlias(a)) if a == "nope"
        ));

        let mut criteria = Criteria::new("Customer");
        criteria
            .create_alias("ghost.items", "i", JoinKind::Inner)
            .unwrap();
        assert!(matches!(
            Renderer::new(&metadata).render(&criteria),
            Err(GraphFetchError::UnknownAlias(_))
        ));
    }

    #[test]
    fn association_load_statements() {
        let metadata = metadata();
        let renderer = Renderer::new(&metadata);
        let many = renderer
            .association_load("Customer", "orders", &Key::Integer(4))
            .unwrap()
            .sql();
        assert_eq!(
            many,
            "SELECT \"t\".* FROM \"orders\" AS \"t\" WHERE \"t\".\"customer_id\" = ? ORDER BY \"t\".\"id\""
        );
        let one = renderer
            .association_load("Order", "customer", &Key::Integer(4))
            .unwrap()
            .sql();
        assert_eq!(
            one,
            "SELECT \"t\".* FROM \"customers\" AS \"t\" WHERE \"t\".\"id\" = ?"
        );
        assert!(matches!(
            renderer.association_load("Customer", "missing", &Key::Integer(1)),
            Err(GraphFetchError::Mapping(_))
        ));
    }
}
