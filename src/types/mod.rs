//! # Types Module
//!
//! Payloads exchanged with the UI and the upstream providers.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`weather`] | Current weather, forecast, geocoding and their queries |
//! | [`poetry`] | Poem requests and responses |
//! | [`community`] | Comments and newsletter subscriptions |
//! | [`message`] | Chat messages for completion endpoints |

pub mod community;
pub mod message;
pub mod poetry;
pub mod weather;

pub use community::{Comment, CommentAck, NewComment, SubscribeAck, Subscription};
pub use message::{Message, MessageRole};
pub use poetry::{Poem, PoetryRequest};
pub use weather::{CurrentWeather, ForecastDay, GeocodeQuery, Place, WeatherQuery};
