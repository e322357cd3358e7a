mod loader;
mod registry;

pub use loader::{
    endpoint_filter_from_env, load_config, GlobalConfig, LoadedConfig, RunDefaults, ENDPOINTS_VAR,
    SECRET_VAR,
};
pub use registry::{
    BodyDescriptor, BodyKind, EndpointDescriptor, EndpointRegistry, FieldSpec, HttpMethod,
    ScenarioConfig, ThresholdConfig,
};
