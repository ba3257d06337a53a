use thiserror::Error;

/// Every failure here is fatal for the unit being transformed: they signal a
/// broken registry or plugin config, never a property of the input source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RebindError {
    #[error("`{name}` is not a valid identifier and cannot be tracked as a global")]
    InvalidTargetName { name: String },
    #[error("initializer template for `{name}` failed to parse: {message}")]
    TemplateParse { name: String, message: String },
    #[error("initializer template for `{name}` must declare exactly one identifier, found {found}")]
    TemplateShape { name: String, found: String },
    #[error("no free name for `{name}` after {attempts} attempts")]
    NameSearchExhausted { name: String, attempts: u32 },
    #[error("no unused trace id after {attempts} attempts")]
    TraceIdExhausted { attempts: u32 },
    #[error("invalid plugin config: {message}")]
    Config { message: String },
}
