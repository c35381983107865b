pub mod settings;

// Re-export commonly used types
pub use settings::{
    default_bindings, load_settings, save_settings, BindingEntry, PhysicsSettings, Settings,
    TickerSettings, VehicleSettings, WorldSettings,
};
