//! Client-side reconciliation of a paginated, searchable, reorderable and
//! selectable list whose order and selection live on a remote service.

pub mod adapter;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod store;

pub use adapter::{dispatch, handle_event, RenderModel, ScrollMetrics, ViewEvent};
pub use config::{load_settings, ControllerConfig, Settings};
pub use controller::{ListController, Outcome};
pub use error::{GatewayError, ListError};
pub use gateway::{HttpStateGateway, Page, RemoteState, SelectionSet, StateGateway};
pub use store::{ListSnapshot, ListState, LoadKind, Phase};
