// Sessions and typed queries
// A SessionFactory owns a loaded store; sessions borrow it for as long as
// they are open and queries borrow the session

use crate::config::{PersistenceConfig, Profile};
use crate::error::{Error, Result};
use crate::mapping::Metamodel;
use crate::model::Entity;
use crate::query::executor::{Parameters, QueryResult};
use crate::query::plan::QueryPlan;
use crate::query::QueryExecutor;
use crate::storage::dataset::Dataset;
use crate::storage::Value;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Entry point to a data store
pub struct SessionFactory {
    executor: QueryExecutor,
    show_sql: bool,
    next_session: AtomicU64,
}

impl SessionFactory {
    /// Wrap an already populated executor
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            executor,
            show_sql: false,
            next_session: AtomicU64::new(1),
        }
    }

    /// Open the store a named profile of a config file points at
    pub fn from_config(path: &Path, profile: &str) -> Result<Self> {
        let config = PersistenceConfig::from_file(path)?;
        Self::from_profile(profile, config.profile(profile)?)
    }

    pub fn from_profile(name: &str, profile: &Profile) -> Result<Self> {
        info!(profile = name, dataset = %profile.dataset.display(), "opening data store");

        let dataset = Dataset::load(&profile.dataset)?;
        let mut executor = QueryExecutor::new(Metamodel::movies())?;
        dataset.load_into(&mut executor)?;

        Ok(Self::new(executor).show_sql(profile.show_sql))
    }

    /// Log query texts at INFO level
    pub fn show_sql(mut self, show_sql: bool) -> Self {
        self.show_sql = show_sql;
        self
    }

    pub fn open_session(&self) -> Session<'_> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, "session opened");
        Session { factory: self, id }
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }
}

/// An open session; closed when dropped
pub struct Session<'f> {
    factory: &'f SessionFactory,
    id: u64,
}

impl<'f> Session<'f> {
    /// Parse and plan a query returning entities of type T
    ///
    /// Fails straight away when the text is malformed, names unknown
    /// entities or attributes, or selects something other than a T.
    pub fn create_query<T: Entity>(&self, text: &str) -> Result<TypedQuery<'_, T>> {
        let plan = self.prepare(text)?;

        match plan.result_entity() {
            Some(name) if name == T::NAME => {}
            found => {
                return Err(Error::type_mismatch(
                    format!("a query selecting {}", T::NAME),
                    found.unwrap_or("a projection of values"),
                ))
            }
        }

        Ok(TypedQuery {
            executor: &self.factory.executor,
            plan,
            params: Parameters::new(),
            first_result: 0,
            max_results: None,
            _entity: PhantomData,
        })
    }

    /// Run any query and get the raw rows back
    pub fn query(&self, text: &str, params: &Parameters) -> Result<QueryResult> {
        let plan = self.prepare(text)?;
        self.factory.executor.execute(&plan, params)
    }

    fn prepare(&self, text: &str) -> Result<QueryPlan> {
        if self.factory.show_sql {
            info!(session = self.id, "{}", text.trim());
        }
        self.factory.executor.prepare(text)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        debug!(session = self.id, "session closed");
    }
}

/// A query returning entities of type T, with its parameter bindings
pub struct TypedQuery<'s, T> {
    executor: &'s QueryExecutor,
    plan: QueryPlan,
    params: Parameters,
    first_result: usize,
    max_results: Option<usize>,
    _entity: PhantomData<T>,
}

impl<'s, T: Entity> TypedQuery<'s, T> {
    /// Bind a value to a named (`:name`) or positional (`?1` -> "1") placeholder
    pub fn set_parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        if !self.plan.parameters.iter().any(|p| p == name) {
            warn!(parameter = name, "query has no such parameter");
        }
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Skip the first `first` results
    pub fn set_first_result(mut self, first: usize) -> Self {
        self.first_result = first;
        self
    }

    pub fn set_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn get_result_list(&self) -> Result<Vec<T>> {
        let result = self.executor.execute_paged(
            &self.plan,
            &self.params,
            self.first_result,
            self.max_results,
        )?;
        result.rows.iter().map(T::from_row).collect()
    }

    /// Exactly one result, or NoResult / NonUniqueResult
    pub fn get_single_result(&self) -> Result<T> {
        let mut results = self.get_result_list()?;
        match results.len() {
            0 => Err(Error::NoResult),
            1 => Ok(results.remove(0)),
            n => Err(Error::NonUniqueResult(n)),
        }
    }
}
