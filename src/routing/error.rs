#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown route token: {0}")]
    UnknownRouteToken(String),
    #[error("duplicate {kind} in modal registry: {value}")]
    DuplicateRegistration { kind: &'static str, value: String },
    #[error("modal {modal_id} not mounted after {attempts} attempts")]
    TargetNotReady { modal_id: String, attempts: u32 },
    #[error("nothing matches \"{sub_path}\" inside {modal_id}")]
    SubEntityNotFound { modal_id: String, sub_path: String },
}
