//! Map-reduce and group-by commands and their results.
//!
//! Result wrappers never fail on a malformed raw document: every counter or
//! metadata field that is missing or of the wrong type falls back to a
//! sentinel (`-1` for counters, `None` for names).

use bson::{Bson, Document, doc};

use crate::document::DocumentExt;

/// Sentinel for counters absent from a raw result.
pub const NOT_AVAILABLE: i64 = -1;

/// Input, emit and output counters of a map-reduce run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapReduceCounts {
    /// Documents read.
    pub input_count: i64,
    /// Values emitted by the map function.
    pub emit_count: i64,
    /// Documents written.
    pub output_count: i64,
}

impl MapReduceCounts {
    /// No counts available.
    pub const NONE: Self = Self {
        input_count: NOT_AVAILABLE,
        emit_count: NOT_AVAILABLE,
        output_count: NOT_AVAILABLE,
    };

    /// Read the `counts` sub-document of a raw result.
    pub fn from_raw(raw: &Document) -> Self {
        let Some(counts) = raw.get_document_opt("counts") else {
            return Self::NONE;
        };
        Self {
            input_count: counts.get_integer_opt("input").unwrap_or(NOT_AVAILABLE),
            emit_count: counts.get_integer_opt("emit").unwrap_or(NOT_AVAILABLE),
            output_count: counts.get_integer_opt("output").unwrap_or(NOT_AVAILABLE),
        }
    }
}

impl Default for MapReduceCounts {
    fn default() -> Self {
        Self::NONE
    }
}

/// Phase timings of a map-reduce run, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapReduceTiming {
    /// Time spent in the map function.
    pub map_time: i64,
    /// Time spent in the emit loop.
    pub emit_loop_time: i64,
    /// Total run time.
    pub total_time: i64,
}

impl MapReduceTiming {
    /// No timing available.
    pub const NONE: Self = Self {
        map_time: NOT_AVAILABLE,
        emit_loop_time: NOT_AVAILABLE,
        total_time: NOT_AVAILABLE,
    };

    /// Read the `timing` sub-document, falling back to `timeMillis` for the
    /// total when verbose timing was not requested.
    pub fn from_raw(raw: &Document) -> Self {
        match raw.get_document_opt("timing") {
            Some(timing) => Self {
                map_time: timing.get_integer_opt("mapTime").unwrap_or(NOT_AVAILABLE),
                emit_loop_time: timing.get_integer_opt("emitLoop").unwrap_or(NOT_AVAILABLE),
                total_time: timing.get_integer_opt("total").unwrap_or(NOT_AVAILABLE),
            },
            None => Self {
                total_time: raw.get_integer_opt("timeMillis").unwrap_or(NOT_AVAILABLE),
                ..Self::NONE
            },
        }
    }
}

impl Default for MapReduceTiming {
    fn default() -> Self {
        Self::NONE
    }
}

/// Mapped results of a map-reduce run plus its raw metadata.
#[derive(Debug, Clone)]
pub struct MapReduceResults<T> {
    mapped_results: Vec<T>,
    raw: Document,
    output_collection: Option<String>,
    output_database: Option<String>,
    counts: MapReduceCounts,
    timing: MapReduceTiming,
}

impl<T> MapReduceResults<T> {
    /// Wrap mapped results and parse the raw command result.
    pub fn new(mapped_results: Vec<T>, raw: Document) -> Self {
        Self {
            output_collection: output_collection(&raw),
            output_database: output_database(&raw),
            counts: MapReduceCounts::from_raw(&raw),
            timing: MapReduceTiming::from_raw(&raw),
            mapped_results,
            raw,
        }
    }

    /// Mapped result values.
    pub fn results(&self) -> &[T] {
        &self.mapped_results
    }

    /// Take ownership of the mapped values.
    pub fn into_results(self) -> Vec<T> {
        self.mapped_results
    }

    /// The raw command result.
    pub fn raw(&self) -> &Document {
        &self.raw
    }

    /// Collection the results were written to, if not inline.
    pub fn output_collection(&self) -> Option<&str> {
        self.output_collection.as_deref()
    }

    /// Database of the output collection, when the reply names one.
    pub fn output_database(&self) -> Option<&str> {
        self.output_database.as_deref()
    }

    /// Counters.
    pub fn counts(&self) -> MapReduceCounts {
        self.counts
    }

    /// Timings.
    pub fn timing(&self) -> MapReduceTiming {
        self.timing
    }
}

impl<'a, T> IntoIterator for &'a MapReduceResults<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.mapped_results.iter()
    }
}

/// `result` is either `{ collection, db }` or the collection name itself.
fn output_collection(raw: &Document) -> Option<String> {
    match raw.get("result")? {
        Bson::Document(result) => result.get_str_opt("collection").map(String::from),
        Bson::String(name) => Some(name.clone()),
        Bson::Null => None,
        other => Some(other.to_string()),
    }
}

fn output_database(raw: &Document) -> Option<String> {
    raw.get_document("result")
        .ok()?
        .get_str_opt("db")
        .map(String::from)
}

/// Mapped results of a group command plus its raw metadata.
#[derive(Debug, Clone)]
pub struct GroupByResults<T> {
    mapped_results: Vec<T>,
    raw: Document,
    count: f64,
    keys: i64,
    server_used: Option<String>,
}

impl<T> GroupByResults<T> {
    /// Wrap mapped results and parse the raw command result.
    pub fn new(mapped_results: Vec<T>, raw: Document) -> Self {
        Self {
            count: raw.get_number_opt("count").unwrap_or(NOT_AVAILABLE as f64),
            keys: raw.get_integer_opt("keys").unwrap_or(NOT_AVAILABLE),
            server_used: raw.get_str_opt("serverUsed").map(String::from),
            mapped_results,
            raw,
        }
    }

    /// Mapped result values.
    pub fn results(&self) -> &[T] {
        &self.mapped_results
    }

    /// Take ownership of the mapped values.
    pub fn into_results(self) -> Vec<T> {
        self.mapped_results
    }

    /// The raw command result.
    pub fn raw(&self) -> &Document {
        &self.raw
    }

    /// Documents examined, `-1` when absent.
    pub fn count(&self) -> f64 {
        self.count
    }

    /// Distinct groups, `-1` when absent.
    pub fn keys(&self) -> i64 {
        self.keys
    }

    /// Address of the server that ran the command.
    pub fn server_used(&self) -> Option<&str> {
        self.server_used.as_deref()
    }
}

/// Where map-reduce output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    /// Return results in the command reply.
    #[default]
    Inline,
    /// Replace the output collection.
    Replace,
    /// Merge into the output collection, overwriting existing keys.
    Merge,
    /// Re-reduce against existing output documents.
    Reduce,
}

impl OutputType {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Replace => "replace",
            Self::Merge => "merge",
            Self::Reduce => "reduce",
        }
    }
}

/// Options of a `mapReduce` command.
#[derive(Debug, Clone, Default)]
pub struct MapReduceOptions {
    output_collection: Option<String>,
    output_database: Option<String>,
    output_type: OutputType,
    query: Option<Document>,
    sort: Option<Document>,
    limit: Option<i64>,
    finalize: Option<String>,
    scope: Option<Document>,
    js_mode: Option<bool>,
    verbose: Option<bool>,
}

impl MapReduceOptions {
    /// Inline output with no restrictions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write to a collection, replacing it unless another mode is chosen.
    pub fn output_collection(mut self, collection: impl Into<String>) -> Self {
        self.output_collection = Some(collection.into());
        if self.output_type == OutputType::Inline {
            self.output_type = OutputType::Replace;
        }
        self
    }

    /// Database of the output collection.
    pub fn output_database(mut self, database: impl Into<String>) -> Self {
        self.output_database = Some(database.into());
        self
    }

    /// Return results inline.
    pub fn output_inline(mut self) -> Self {
        self.output_type = OutputType::Inline;
        self
    }

    /// Merge into the output collection.
    pub fn output_merge(mut self) -> Self {
        self.output_type = OutputType::Merge;
        self
    }

    /// Re-reduce into the output collection.
    pub fn output_reduce(mut self) -> Self {
        self.output_type = OutputType::Reduce;
        self
    }

    /// Replace the output collection.
    pub fn output_replace(mut self) -> Self {
        self.output_type = OutputType::Replace;
        self
    }

    /// Restrict input documents.
    pub fn query(mut self, query: Document) -> Self {
        self.query = Some(query);
        self
    }

    /// Sort input documents.
    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Limit input documents.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// JavaScript finalize function.
    pub fn finalize_function(mut self, function: impl Into<String>) -> Self {
        self.finalize = Some(function.into());
        self
    }

    /// Global variables visible to the JavaScript functions.
    pub fn scope(mut self, scope: Document) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Keep intermediate data in JavaScript objects.
    pub fn js_mode(mut self, enabled: bool) -> Self {
        self.js_mode = Some(enabled);
        self
    }

    /// Include timing information in the result.
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = Some(enabled);
        self
    }

    /// Configured database of the output collection.
    pub fn output_database_name(&self) -> Option<&str> {
        self.output_database.as_deref()
    }

    /// Selected output mode.
    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// Whether the command returns results inline.
    pub fn is_inline(&self) -> bool {
        self.output_type == OutputType::Inline || self.output_collection.is_none()
    }

    fn out(&self) -> Bson {
        match (&self.output_collection, self.output_type) {
            (Some(collection), output_type) if output_type != OutputType::Inline => {
                let mut out = doc! { output_type.keyword(): collection.as_str() };
                if let Some(db) = &self.output_database {
                    out.insert("db", db.as_str());
                }
                Bson::Document(out)
            }
            _ => Bson::Document(doc! { "inline": 1 }),
        }
    }

    /// Build the command document.
    pub fn build_command(
        &self,
        collection: &str,
        map_function: &str,
        reduce_function: &str,
    ) -> Document {
        let mut command = doc! {
            "mapReduce": collection,
            "map": Bson::JavaScriptCode(map_function.to_string()),
            "reduce": Bson::JavaScriptCode(reduce_function.to_string()),
            "out": self.out(),
        };

        if let Some(query) = &self.query {
            command.insert("query", query.clone());
        }
        if let Some(sort) = &self.sort {
            command.insert("sort", sort.clone());
        }
        if let Some(limit) = self.limit {
            command.insert("limit", limit);
        }
        if let Some(finalize) = &self.finalize {
            command.insert("finalize", Bson::JavaScriptCode(finalize.clone()));
        }
        if let Some(scope) = &self.scope {
            command.insert("scope", scope.clone());
        }
        if let Some(js_mode) = self.js_mode {
            command.insert("jsMode", js_mode);
        }
        if let Some(verbose) = self.verbose {
            command.insert("verbose", verbose);
        }

        command
    }
}

/// A `group` command.
#[derive(Debug, Clone, Default)]
pub struct GroupBy {
    keys: Vec<String>,
    key_function: Option<String>,
    initial: Document,
    reduce: Option<String>,
    finalize: Option<String>,
}

impl GroupBy {
    /// Group by field values.
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Group by the result of a JavaScript key function.
    pub fn key_function(function: impl Into<String>) -> Self {
        Self {
            key_function: Some(function.into()),
            ..Self::default()
        }
    }

    /// Initial aggregation document.
    pub fn initial_document(mut self, initial: Document) -> Self {
        self.initial = initial;
        self
    }

    /// JavaScript reduce function.
    pub fn reduce_function(mut self, function: impl Into<String>) -> Self {
        self.reduce = Some(function.into());
        self
    }

    /// JavaScript finalize function.
    pub fn finalize_function(mut self, function: impl Into<String>) -> Self {
        self.finalize = Some(function.into());
        self
    }

    /// Build the command document for `collection`, restricted by `condition`.
    pub fn build_command(&self, collection: &str, condition: Option<Document>) -> Document {
        let mut group = doc! { "ns": collection };

        match &self.key_function {
            Some(function) => {
                group.insert("$keyf", Bson::JavaScriptCode(function.clone()));
            }
            None => {
                let keys: Document = self
                    .keys
                    .iter()
                    .map(|k| (k.clone(), Bson::Int32(1)))
                    .collect();
                group.insert("key", keys);
            }
        }

        group.insert("initial", self.initial.clone());
        if let Some(reduce) = &self.reduce {
            group.insert("$reduce", Bson::JavaScriptCode(reduce.clone()));
        }
        if let Some(finalize) = &self.finalize {
            group.insert("finalize", Bson::JavaScriptCode(finalize.clone()));
        }
        if let Some(condition) = condition {
            group.insert("cond", condition);
        }

        doc! { "group": group }
    }
}
