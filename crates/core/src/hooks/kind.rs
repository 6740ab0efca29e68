//! The device calls this crate intercepts

use std::fmt;

use d3d9hook_sdk::DeviceMethod;

/// One intercepted call kind
///
/// Doubles as the event channel identifier: every kind has exactly one
/// redirection and one subscriber channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeginScene,
    EndScene,
    Present,
    PresentEx,
    Reset,
}

impl HookKind {
    pub const COUNT: usize = 5;

    /// All kinds, in installation order
    pub const ALL: [HookKind; Self::COUNT] = [
        HookKind::BeginScene,
        HookKind::EndScene,
        HookKind::Present,
        HookKind::PresentEx,
        HookKind::Reset,
    ];

    /// The device method this kind redirects
    pub const fn method(self) -> DeviceMethod {
        match self {
            Self::BeginScene => DeviceMethod::BeginScene,
            Self::EndScene => DeviceMethod::EndScene,
            Self::Present => DeviceMethod::Present,
            Self::PresentEx => DeviceMethod::PresentEx,
            Self::Reset => DeviceMethod::Reset,
        }
    }

    /// Dense index for per-kind tables
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Only installable when the extended interface is supported
    pub const fn requires_extended(self) -> bool {
        self.method().is_extended()
    }

    pub const fn name(self) -> &'static str {
        self.method().name()
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
