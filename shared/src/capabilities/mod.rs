//! Shell-facing ports.
//!
//! Render and Http come from Crux directly; the rest are defined here.
mod dialer;
mod geolocation;
mod guidance;
mod share;
mod ticker;

pub use crux_core::render::Render;
pub use crux_http::Http;

pub use self::dialer::{DialOperation, Dialer};
pub use self::geolocation::{Geolocation, GeolocationOperation, GeolocationOutput};
pub use self::guidance::{Guidance, GuidanceOperation, GuidanceOutput};
pub use self::share::{Share, ShareOperation};
pub use self::ticker::{Ticker, TickerOperation, TickerOutput, TimerId};
