//! Services module - Business logic behind the orchestrator.
//!
//! The services have no knowledge of jobs, controllers or presentation; they
//! take explicit inputs and return explicit results.
//!
//! # Components
//!
//! - [`GatewayClient`]: the contract with the external processing engine:
//!   - discover the files currently eligible in a source folder
//!   - process one file, or every discovered file once ([`GatewayClient::process_batch`])
//!   - check a pattern-mapping document before any file is touched
//!
//! - [`CommandGateway`]: the default [`GatewayClient`], which spawns the engine
//!   executable per file with tokio and enforces the project's processing timeout
//!
//! - [`sanitizer`]: finds and normalizes file and folder names containing
//!   irregular whitespace
//!
//! # Usage Example
//!
//! ```ignore
//! use docgate::services::{CommandGateway, GatewayClient};
//!
//! let gateway = CommandGateway::new("/opt/gateway/gateway");
//! for file in gateway.discover_files(&config).await? {
//!     let ok = gateway.process_one(&config, &file).await?;
//! }
//! ```

pub mod command_gateway;
pub mod gateway;
pub mod sanitizer;

pub use command_gateway::CommandGateway;
pub use gateway::{BatchProgress, GatewayClient, GatewayError};
pub use sanitizer::{SanitizeError, canonical_name, find_irregular_names, normalize_names};
