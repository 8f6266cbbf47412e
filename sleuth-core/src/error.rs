//! Error types for the Sleuth explanation engine.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering grammars, parsing, hypothesis evaluation, learning, input
//! generation, the oracle, and configuration.

/// Top-level error type for the Sleuth core library.
#[derive(Debug, thiserror::Error)]
pub enum SleuthError {
    #[error("Grammar error: {0}")]
    Grammar(#[from] GrammarError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Training error: {0}")]
    Training(#[from] TrainingError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Explainer error: {0}")]
    Explainer(#[from] ExplainerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from grammar validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("Start symbol {start} is not defined")]
    MissingStartSymbol { start: String },

    #[error("Nonterminal {nonterminal} is referenced by {referenced_by} but never defined")]
    UndefinedNonterminal {
        nonterminal: String,
        referenced_by: String,
    },

    #[error("Nonterminal {nonterminal} is not reachable from the start symbol")]
    UnreachableNonterminal { nonterminal: String },

    #[error("Nonterminal {nonterminal} has no expansion alternatives")]
    EmptyRule { nonterminal: String },

    #[error("Invalid nonterminal name: {name}")]
    InvalidNonterminal { name: String },

    #[error("Nonterminal {nonterminal} cannot derive a finite string")]
    NonTerminating { nonterminal: String },
}

/// Errors from parsing a string against a grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("No complete parse for {input:?}")]
    NoParse { input: String },

    #[error("Left recursion through {nonterminal} at offset {offset}")]
    LeftRecursion { nonterminal: String, offset: usize },

    #[error("Unknown nonterminal {nonterminal}")]
    UnknownNonterminal { nonterminal: String },
}

/// Errors raised while evaluating a hypothesis against a single input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Input {input:?} carries no feature vector")]
    MissingFeatures { input: String },

    #[error("Malformed query {query}: {reason}")]
    MalformedQuery { query: String, reason: String },
}

/// Errors from fitting a learner to labeled inputs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrainingError {
    #[error("No labeled inputs available for training")]
    NoLabeledData,

    #[error("Invalid training table: {message}")]
    InvalidTable { message: String },

    #[error("Model fitting failed: {message}")]
    Model { message: String },
}

/// Errors from input generation. These are informational: generation
/// degrades to fewer inputs rather than failing the loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Generator exhausted after {attempts} attempts")]
    Exhausted { attempts: usize },

    #[error("Generation worker {worker} terminated abnormally")]
    WorkerFailed { worker: usize },
}

/// Errors raised by an oracle. These are never swallowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle failed on input {input:?}: {message}")]
    Failed { input: String, message: String },
}

/// Errors from the configuration system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from assembling or running the explainer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExplainerError {
    #[error("No seed input could be parsed against the grammar")]
    NoSeedInputs,

    #[error("Explainer is missing a {component}")]
    MissingComponent { component: String },
}

/// A type alias for results using the top-level `SleuthError`.
pub type Result<T> = std::result::Result<T, SleuthError>;
