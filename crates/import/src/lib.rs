pub mod completer;
pub mod csv;
pub mod filing;
pub mod importer;
pub mod reconcile;
pub mod statement;
pub(crate) mod util;

pub use completer::{CompleterOptions, TransactionCompleter};
pub use csv::{parse_statement, read_statement, ColumnMapping, CsvError, StatementProfile};
pub use filing::{FilingConfig, FilingFormat, FilingImporter};
pub use importer::{
    CompleterConfig, EntryFilter, Extraction, ImportConfigError, Importer, ImporterConfig,
    ImportersConfig, StatementFormat, StatementImporter,
};
pub use reconcile::{reconcile, Reconciliation};
pub use statement::StatementRow;
