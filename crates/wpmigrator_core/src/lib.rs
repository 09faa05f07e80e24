pub mod config;
pub mod driver;
pub mod error;
pub mod frontmatter;
pub mod index;
pub mod layout;
pub mod markdown;
pub mod record;
pub mod redirects;
pub mod sink;
pub mod source;
pub mod templater;

pub use driver::{MigrationDriver, MigrationOptions, MigrationReport, Phase};
pub use error::{MigrateError, Result};
pub use record::{EntityKind, Record};
