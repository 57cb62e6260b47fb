//! Generic data-access object over a [`LoadEntities`] session.

use std::marker::PhantomData;

use graphfetch_core::{
    Criteria, Criterion, Diagnostic, GraphFetchError, InitReport, Initializer, JoinPath,
    JoinResolver, Key, LoadEntities, Order, Persistent, ProjectionList, PropertyCriterion,
    PropertyOrder, Result, ResultTransform, SearchCriteria, Value, apply_property_criteria,
    count_of_subquery, criterion,
};

/// Rows of a fetch with what happened while initializing them.
#[derive(Debug)]
pub struct Fetched<T> {
    pub rows: Vec<T>,
    pub initialization: InitReport,
    /// Join paths the resolver left out of the initialization tree.
    pub diagnostics: Vec<Diagnostic>,
}

/// Query surface for one entity type.
///
/// Negative `first_row`/`page_size` arguments mean no offset or no limit.
pub struct GenericDao<'s, S, T> {
    session: &'s mut S,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, S, T> GenericDao<'s, S, T>
where
    S: LoadEntities<T>,
    T: Persistent,
{
    pub fn new(session: &'s mut S) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    pub fn session(&mut self) -> &mut S {
        self.session
    }

    fn criteria(&self) -> Criteria {
        Criteria::new(T::ENTITY_NAME)
    }

    /// One page of rows with the join paths applied and their force-select
    /// branches materialized.
    pub fn fetch_page(
        &mut self,
        join_paths: &[JoinPath],
        restrictions: &[Criterion],
        orders: &[Order],
        first_row: i64,
        page_size: i64,
    ) -> Result<Vec<T>> {
        self.fetch_page_detailed(join_paths, restrictions, orders, first_row, page_size)
            .map(|fetched| fetched.rows)
    }

    pub fn fetch_page_detailed(
        &mut self,
        join_paths: &[JoinPath],
        restrictions: &[Criterion],
        orders: &[Order],
        first_row: i64,
        page_size: i64,
    ) -> Result<Fetched<T>> {
        let mut criteria = self.criteria();
        let resolution = JoinResolver::new(&mut criteria).resolve(join_paths)?;
        for restriction in restrictions {
            criteria.add(restriction.clone());
        }
        for order in orders {
            criteria.add_order(order.clone());
        }
        if let Ok(first) = u32::try_from(first_row) {
            criteria.set_first_result(first);
        }
        if let Ok(size) = u32::try_from(page_size) {
            criteria.set_max_results(size);
        }

        let rows = self.session.list(&criteria)?;
        let initialization =
            Initializer::new(&mut *self.session).initialize(resolution.init_tree(), &rows);
        Ok(Fetched {
            rows,
            initialization,
            diagnostics: resolution.diagnostics,
        })
    }

    pub fn fetch_all(
        &mut self,
        join_paths: &[JoinPath],
        restrictions: &[Criterion],
        orders: &[Order],
    ) -> Result<Vec<T>> {
        self.fetch_page(join_paths, restrictions, orders, -1, -1)
    }

    pub fn row_count(&mut self, restrictions: &[Criterion]) -> Result<u64> {
        self.row_count_with_paths(restrictions, &[])
    }

    /// Counts matching rows. With a grouping field the grouped statement is
    /// rendered and counted as a derived table.
    pub fn row_count_with_paths(
        &mut self,
        restrictions: &[Criterion],
        join_paths: &[JoinPath],
    ) -> Result<u64> {
        let mut criteria = self.criteria();
        let resolution = JoinResolver::new(&mut criteria).resolve(join_paths)?;
        for restriction in restrictions {
            criteria.add(restriction.clone());
        }

        if resolution.has_grouping() {
            criteria.set_projection(ProjectionList::group_by(resolution.grouping.iter().cloned()));
            let grouped = self.session.render(&criteria)?;
            self.session.count_native(&count_of_subquery(grouped))
        } else {
            criteria.set_projection(ProjectionList::row_count());
            self.session.count(&criteria)
        }
    }

    /// Runs a criteria tree with distinct roots. `first_result` applies when
    /// non-negative, `max_results` when positive.
    pub fn search_by_criteria_tree(
        &mut self,
        tree: Option<&SearchCriteria>,
        first_result: i64,
        max_results: i64,
    ) -> Result<Vec<T>> {
        let mut criteria = self.criteria();
        if let Some(tree) = tree {
            tree.apply(&mut criteria, true)?;
        }
        if let Ok(first) = u32::try_from(first_result) {
            criteria.set_first_result(first);
        }
        if max_results > 0 {
            if let Ok(max) = u32::try_from(max_results) {
                criteria.set_max_results(max);
            }
        }
        criteria.set_result_transform(ResultTransform::DistinctRoot);
        self.session.list(&criteria)
    }

    pub fn search_by_criteria_tree_count(&mut self, tree: Option<&SearchCriteria>) -> Result<u64> {
        let mut criteria = self.criteria();
        if let Some(tree) = tree {
            tree.apply(&mut criteria, false)?;
        }
        criteria
            .set_result_transform(ResultTransform::DistinctRoot)
            .set_projection(ProjectionList::row_count());
        self.session.count(&criteria)
    }

    /// Predicates and orders scoped to root associations. Pagination applies
    /// only when `first_result >= 0` and `max_results > 0`.
    pub fn search_by_property_criteria(
        &mut self,
        entries: &[PropertyCriterion],
        orders: &[PropertyOrder],
        first_result: i64,
        max_results: i64,
    ) -> Result<Vec<T>> {
        let mut criteria = self.criteria();
        apply_property_criteria(&mut criteria, entries, orders)?;
        if first_result >= 0 && max_results > 0 {
            if let (Ok(first), Ok(max)) = (u32::try_from(first_result), u32::try_from(max_results)) {
                criteria.set_first_result(first).set_max_results(max);
            }
        }
        self.session.list(&criteria)
    }

    /// A page filtered by property equality, optionally sorted by one column.
    pub fn current_page_rows(
        &mut self,
        first: i64,
        page_size: i64,
        sort_column: Option<&str>,
        ascending: bool,
        params: &[(&str, Value)],
    ) -> Result<Vec<T>> {
        let mut criteria = self.criteria();
        for (property, value) in params {
            criteria.add(criterion::eq(property, value.clone()));
        }
        if let Some(column) = sort_column {
            criteria.add_order(if ascending {
                Order::asc(column)
            } else {
                Order::desc(column)
            });
        }
        if let Ok(first) = u32::try_from(first) {
            criteria.set_first_result(first);
        }
        if let Ok(size) = u32::try_from(page_size) {
            criteria.set_max_results(size);
        }
        self.session.list(&criteria)
    }

    /// The entity with `id`, or [`GraphFetchError::NotFound`].
    pub fn get(&mut self, id: impl Into<Key>) -> Result<T> {
        let id = id.into();
        match self.session.get(&id)? {
            Some(entity) => Ok(entity),
            None => Err(GraphFetchError::NotFound {
                entity: T::ENTITY_NAME,
                id: compact_str::format_compact!("{id}"),
            }),
        }
    }

    pub fn exists(&mut self, id: impl Into<Key>) -> Result<bool> {
        Ok(self.session.get(&id.into())?.is_some())
    }

    pub fn get_all(&mut self) -> Result<Vec<T>> {
        let criteria = self.criteria();
        self.session.list(&criteria)
    }

    /// Every row once per identity, first occurrence order.
    pub fn get_all_distinct(&mut self) -> Result<Vec<T>> {
        Ok(ResultTransform::DistinctRoot.apply(self.get_all()?))
    }

    pub fn clear_cache(&mut self) {
        self.session.clear();
    }
}
