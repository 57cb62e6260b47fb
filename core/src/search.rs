//! Criteria trees and property-scoped criteria.
//!
//! A [`SearchCriteria`] is a caller-built tree of filter scopes keyed by
//! relation name. It is unrelated to the join path alias graph: every node
//! becomes its own sub-criteria join when the tree is applied.
//!
//! ```
//! use graphfetch_core::{Criteria, JoinKind, SearchCriteria, criterion};
//!
//! let mut tree = SearchCriteria::new("Customer");
//! tree.add_criterion(criterion::eq("region", "EU"));
//! tree.add_criterion_at(criterion::eq("status", "OPEN"), "orders");
//! tree.add_criterion_at(criterion::gt("quantity", 1), "orders.items");
//! tree.sub_criteria_or_insert("orders").set_join_type(JoinKind::Left);
//!
//! let mut criteria = Criteria::new("Customer");
//! tree.apply(&mut criteria, true).unwrap();
//! assert_eq!(criteria.joins().len(), 2);
//! assert_eq!(criteria.restrictions().len(), 3);
//! ```

use compact_str::CompactString;
use hashbrown::HashMap;

use crate::criteria::{Criteria, JoinKind, ROOT_ALIAS};
use crate::criterion::{Criterion, Order};
use crate::error::Result;

/// A node of a criteria tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub entity_name: CompactString,
    pub join_type: JoinKind,
    pub criteria: Vec<Criterion>,
    pub orders: Vec<Order>,
    pub children: Vec<SearchCriteria>,
}

impl SearchCriteria {
    pub fn new(entity_name: &str) -> Self {
        Self::with_join(entity_name, JoinKind::Inner)
    }

    pub fn with_join(entity_name: &str, join_type: JoinKind) -> Self {
        Self {
            entity_name: CompactString::from(entity_name),
            join_type,
            criteria: Vec::new(),
            orders: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builds `a` with the chain `b -> c` below it from `"a.b.c"`.
    pub fn from_path(expression: &str) -> Self {
        let mut segments = expression.split('.');
        let mut root = Self::new(segments.next().unwrap_or_default());
        let mut node = &mut root;
        for segment in segments {
            node = node.sub_criteria_or_insert(segment);
        }
        root
    }

    pub fn set_join_type(&mut self, join_type: JoinKind) -> &mut Self {
        self.join_type = join_type;
        self
    }

    pub fn add_sub_criteria(&mut self, child: SearchCriteria) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Direct child named `name`.
    pub fn sub_criteria(&self, name: &str) -> Option<&SearchCriteria> {
        self.children.iter().find(|c| c.entity_name == name)
    }

    pub fn sub_criteria_mut(&mut self, name: &str) -> Option<&mut SearchCriteria> {
        self.children.iter_mut().find(|c| c.entity_name == name)
    }

    /// Direct child named `name`, created with an inner join if absent.
    pub fn sub_criteria_or_insert(&mut self, name: &str) -> &mut SearchCriteria {
        match self.children.iter().position(|c| c.entity_name == name) {
            Some(i) => &mut self.children[i],
            None => {
                self.children.push(Self::new(name));
                let last = self.children.len() - 1;
                &mut self.children[last]
            }
        }
    }

    /// Descendant at the dotted path `"b.c"`, relative to this node.
    pub fn find(&self, path: &str) -> Option<&SearchCriteria> {
        path.split('.')
            .try_fold(self, |node, segment| node.sub_criteria(segment))
    }

    /// Node at `path`, creating missing nodes along the way. An empty path is
    /// this node; an empty segment yields `None`.
    fn find_or_insert(&mut self, path: &str) -> Option<&mut SearchCriteria> {
        if path.is_empty() {
            return Some(self);
        }
        let mut node = self;
        for segment in path.split('.') {
            if segment.trim().is_empty() {
                return None;
            }
            node = node.sub_criteria_or_insert(segment);
        }
        Some(node)
    }

    pub fn add_criterion(&mut self, criterion: Criterion) -> &mut Self {
        self.criteria.push(criterion);
        self
    }

    /// Attaches `criterion` at `path`, creating intermediate nodes.
    ///
    /// Returns false only for a path with an empty segment.
    pub fn add_criterion_at(&mut self, criterion: Criterion, path: &str) -> bool {
        match self.find_or_insert(path) {
            Some(node) => {
                node.add_criterion(criterion);
                true
            }
            None => false,
        }
    }

    pub fn add_order(&mut self, order: Order) -> &mut Self {
        self.orders.push(order);
        self
    }

    pub fn add_order_at(&mut self, order: Order, path: &str) -> bool {
        match self.find_or_insert(path) {
            Some(node) => {
                node.add_order(order);
                true
            }
            None => false,
        }
    }

    /// Applies the tree depth-first: this node's predicates, its orders when
    /// `with_order`, then each child as a sub-criteria join.
    ///
    /// The root node is the query root; its `entity_name` is not joined.
    pub fn apply(&self, criteria: &mut Criteria, with_order: bool) -> Result<()> {
        self.apply_scoped(criteria, ROOT_ALIAS, with_order)
    }

    fn apply_scoped(&self, criteria: &mut Criteria, scope: &str, with_order: bool) -> Result<()> {
        for criterion in &self.criteria {
            criteria.add_scoped(scope, criterion);
        }
        if with_order {
            for order in &self.orders {
                criteria.add_order_scoped(scope, order);
            }
        }
        for child in &self.children {
            let alias = criteria.create_sub_criteria(scope, &child.entity_name, child.join_type)?;
            child.apply_scoped(criteria, &alias, with_order)?;
        }
        Ok(())
    }
}

/// A predicate on the root (`property: None`) or on one of its associations.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCriterion {
    pub property: Option<CompactString>,
    pub criterion: Criterion,
}

impl PropertyCriterion {
    pub fn root(criterion: Criterion) -> Self {
        Self {
            property: None,
            criterion,
        }
    }

    pub fn on(property: &str, criterion: Criterion) -> Self {
        Self {
            property: Some(CompactString::from(property)),
            criterion,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyOrder {
    pub property: Option<CompactString>,
    pub order: Order,
}

impl PropertyOrder {
    pub fn root(order: Order) -> Self {
        Self {
            property: None,
            order,
        }
    }

    pub fn on(property: &str, order: Order) -> Self {
        Self {
            property: Some(CompactString::from(property)),
            order,
        }
    }
}

/// Adds property-scoped predicates and orders, joining each distinct
/// association once as an inner sub-criteria.
pub fn apply_property_criteria(
    criteria: &mut Criteria,
    entries: &[PropertyCriterion],
    orders: &[PropertyOrder],
) -> Result<()> {
    let mut scopes: HashMap<CompactString, CompactString> = HashMap::new();
    let mut scope_of = |criteria: &mut Criteria, property: Option<&CompactString>| -> Result<CompactString> {
        let Some(property) = property else {
            return Ok(CompactString::const_new(ROOT_ALIAS));
        };
        if let Some(alias) = scopes.get(property) {
            return Ok(alias.clone());
        }
        let alias = criteria.create_sub_criteria(ROOT_ALIAS, property, JoinKind::Inner)?;
        scopes.insert(property.clone(), alias.clone());
        Ok(alias)
    };

    for entry in entries {
        let scope = scope_of(criteria, entry.property.as_ref())?;
        criteria.add_scoped(&scope, &entry.criterion);
    }
    for entry in orders {
        let scope = scope_of(criteria, entry.property.as_ref())?;
        criteria.add_order_scoped(&scope, &entry.order);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::{self, CompareOp};

    #[test]
    fn from_path_builds_a_chain() {
        let tree = SearchCriteria::from_path("customer.orders.items");
        assert_eq!(tree.entity_name, "customer");
        let items = tree.find("orders.items").unwrap();
        assert_eq!(items.entity_name, "items");
        assert_eq!(items.join_type, JoinKind::Inner);
        assert!(tree.find("orders.notes").is_none());
    }

    #[test]
    fn add_at_reuses_and_creates_nodes() {
        let mut tree = SearchCriteria::new("Customer");
        assert!(tree.add_criterion_at(criterion::eq("status", "OPEN"), "orders"));
        assert!(tree.add_criterion_at(criterion::gt("quantity", 2), "orders.items"));
        assert!(tree.add_order_at(Order::asc("name"), ""));
        assert!(!tree.add_order_at(Order::asc("sku"), "orders..items"));

        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.orders, vec![Order::asc("name")]);
        assert_eq!(tree.find("orders.items").unwrap().criteria.len(), 1);
    }

    #[test]
    fn equality_is_structural() {
        let mut a = SearchCriteria::new("Customer");
        a.add_criterion_at(criterion::eq("status", "OPEN"), "orders");
        let mut b = SearchCriteria::new("Customer");
        b.sub_criteria_or_insert("orders")
            .add_criterion(criterion::eq("status", "OPEN"));
        assert_eq!(a, b);

        b.sub_criteria_or_insert("orders").set_join_type(JoinKind::Left);
        assert_ne!(a, b);
    }

    #[test]
    fn apply_scopes_predicates_to_generated_aliases() {
        let mut tree = SearchCriteria::new("Customer");
        tree.add_criterion(criterion::eq("region", "EU"));
        tree.add_order(Order::asc("name"));
        tree.add_criterion_at(criterion::eq("status", "OPEN"), "orders");
        tree.add_order_at(Order::desc("id"), "orders");
        tree.sub_criteria_or_insert("orders").set_join_type(JoinKind::Left);

        let mut criteria = Criteria::new("Customer");
        tree.apply(&mut criteria, true).unwrap();

        let join = &criteria.joins()[0];
        assert_eq!(join.owner, ROOT_ALIAS);
        assert_eq!(join.association, "orders");
        assert_eq!(join.kind, JoinKind::Left);
        match &criteria.restrictions()[1] {
            Criterion::Compare { property, op, .. } => {
                assert_eq!(property, &format!("{}.status", join.alias));
                assert_eq!(*op, CompareOp::Eq);
            }
            other => panic!("unexpected restriction {other:?}"),
        }
        assert_eq!(criteria.orders()[0], Order::asc("name"));

        let mut unordered = Criteria::new("Customer");
        tree.apply(&mut unordered, false).unwrap();
        assert!(unordered.orders().is_empty());
    }

    #[test]
    fn property_criteria_join_each_property_once() {
        let mut criteria = Criteria::new("Order");
        apply_property_criteria(
            &mut criteria,
            &[
                PropertyCriterion::root(criterion::eq("status", "OPEN")),
                PropertyCriterion::on("customer", criterion::eq("region", "EU")),
                PropertyCriterion::on("customer", criterion::like("name", "A%")),
            ],
            &[PropertyOrder::on("customer", Order::asc("name"))],
        )
        .unwrap();

        assert_eq!(criteria.joins().len(), 1);
        assert_eq!(criteria.restrictions().len(), 3);
        let alias = &criteria.joins()[0].alias;
        assert_eq!(criteria.orders()[0].property, format!("{alias}.name"));
    }
}
