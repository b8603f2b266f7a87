//! SMART Backend Services authentication for REST clients: JWT-bearer client credentials with
//! endpoint discovery, singleflight token caching, and transparent 401 replay behind one
//! provider contract.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod flows;
pub mod obs;
pub mod provider;
pub mod signing;
pub mod transport;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports for integration tests and demos.

	pub use crate::_prelude::*;
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use bytes::Bytes;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
