use std::rc::Rc;

pub const CONFIG_UNKNOWN_KEYS: &str = "config.unknown_keys";
pub const SURFACE_CREATE_FAILED: &str = "surface.create.failed";
pub const DRAWING_INIT_FAILED: &str = "drawing.init.failed";
pub const GEOMETRY_LOAD_FAILED: &str = "geometry.load.failed";
pub const GEOMETRY_FEATURE_SKIPPED: &str = "geometry.feature.skipped";
pub const GEOMETRY_SERIALIZE_FAILED: &str = "geometry.serialize.failed";
pub const GEOMETRY_NOT_OBJECT: &str = "geometry.serialize.not_object";
pub const GEOMETRY_ADOPT_FAILED: &str = "geometry.adopt.failed";
pub const GEOMETRY_REMOVE_FAILED: &str = "geometry.remove.failed";
pub const BACKGROUND_LOAD_FAILED: &str = "background.load.failed";
pub const GEOLOCATION_FAILED: &str = "geolocation.failed";
pub const GEOLOCATION_UNSUPPORTED: &str = "geolocation.unsupported";
pub const AUTOCENTER_FAILED: &str = "geolocation.autocenter.failed";
pub const LOCATION_CONTROL_FAILED: &str = "location.control.failed";
pub const STALE_CALLBACK: &str = "controller.stale_callback";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub code: &'static str,
    pub message: String,
}

#[derive(Clone)]
pub struct Diagnostics {
    sink: Rc<dyn Fn(Diagnostic)>,
}

impl Diagnostics {
    pub fn new(sink: Rc<dyn Fn(Diagnostic)>) -> Self {
        Self { sink }
    }

    pub fn silent() -> Self {
        Self {
            sink: Rc::new(|_| {}),
        }
    }

    pub fn emit(&self, level: DiagnosticLevel, code: &'static str, message: impl Into<String>) {
        (self.sink)(Diagnostic {
            level,
            code,
            message: message.into(),
        });
    }

    pub fn debug(&self, code: &'static str, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Debug, code, message);
    }

    pub fn info(&self, code: &'static str, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Info, code, message);
    }

    pub fn warn(&self, code: &'static str, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Warn, code, message);
    }

    pub fn error(&self, code: &'static str, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Error, code, message);
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::silent()
    }
}
