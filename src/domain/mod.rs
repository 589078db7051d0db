// Domain layer: core models, ports (interfaces) and the services built on them.
// Nothing here knows which database, cache or sink is plugged in.

pub mod model;
pub mod ports;
pub mod services;
