//! Subscriber channels for intercepted device calls
//!
//! # Architecture
//!
//! ```text
//! render thread → interceptor → channel snapshot → subscribers → original
//! any thread    → on_present / unsubscribe → copy-on-write swap
//! ```
//!
//! # Example
//!
//! ```ignore
//! let subscription = manager.events().on_present(|device, args| {
//!     tracing::info!("Present on {:?} to {:?}", device, args.dest_rect);
//! });
//!
//! manager.events().unsubscribe(subscription);
//! ```

mod channel;
mod types;

use std::sync::Arc;

pub(crate) use channel::Channel;
pub use channel::{SubscriberKey, Subscription};
pub use types::{
    BeginSceneCallback, EndSceneCallback, PresentArgs, PresentCallback, PresentExArgs,
    PresentExCallback, PresentFlags, RegionHandle, ResetCallback,
};

use crate::device::Device;
use crate::hooks::HookKind;
use d3d9hook_sdk::PresentParameters;

macro_rules! event_hub {
    ($( $field:ident: $kind:ident => $callback:ident fn($($arg:ty),*) ),* $(,)?) => {
        paste::paste! {
            /// One subscriber channel per intercepted call kind
            pub struct EventHub {
                $( pub(crate) $field: Channel<$callback>, )*
            }

            impl EventHub {
                pub fn new() -> Self {
                    Self {
                        $( $field: Channel::new(HookKind::$kind), )*
                    }
                }

                $(
                    #[doc = concat!("Subscribe to intercepted ", stringify!($kind), " calls")]
                    pub fn [<on_ $field>]<F>(&self, callback: F) -> Subscription
                    where
                        F: Fn($($arg),*) + Send + Sync + 'static,
                    {
                        self.$field.subscribe(Arc::new(callback))
                    }
                )*

                /// Remove a registration
                ///
                /// Returns `true` if it was still registered.
                pub fn unsubscribe(&self, subscription: Subscription) -> bool {
                    match subscription.kind() {
                        $( HookKind::$kind => self.$field.unsubscribe(subscription.key()), )*
                    }
                }

                /// Number of subscribers for one call kind
                pub fn subscriber_count(&self, kind: HookKind) -> usize {
                    match kind {
                        $( HookKind::$kind => self.$field.len(), )*
                    }
                }

                /// Remove every subscriber of every kind
                pub fn clear(&self) {
                    $( self.$field.clear(); )*
                }
            }
        }
    };
}

event_hub! {
    begin_scene: BeginScene => BeginSceneCallback fn(Device),
    end_scene: EndScene => EndSceneCallback fn(Device),
    present: Present => PresentCallback fn(Device, &PresentArgs),
    present_ex: PresentEx => PresentExCallback fn(Device, &PresentExArgs),
    reset: Reset => ResetCallback fn(Device, &PresentParameters),
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
