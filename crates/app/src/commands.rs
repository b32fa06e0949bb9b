use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ValueEnum;
use reckon_core::render::render;
use reckon_core::{Diagnostic, Directive};
use reckon_import::{
    Extraction, FilingImporter, Importer, ImportersConfig, StatementImporter, TransactionCompleter,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Beancount,
    Json,
}

#[derive(Debug, Serialize)]
struct FileExtraction<'a> {
    file: String,
    importer: String,
    #[serde(flatten)]
    extraction: &'a Extraction,
}

/// The importers declared in a configuration file: statement importers
/// first, then filing importers, each in declaration order.
#[derive(Debug)]
pub struct Importers {
    importers: Vec<Box<dyn Importer>>,
}

impl Importers {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config = ImportersConfig::from_toml(&text)
            .with_context(|| format!("parsing {}", config_path.display()))?;
        let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

        let mut importers: Vec<Box<dyn Importer>> =
            Vec::with_capacity(config.importers.len() + config.filings.len());
        for importer_config in &config.importers {
            let mut importer = StatementImporter::new(importer_config)
                .with_context(|| format!("importer for {}", importer_config.account))?;
            if let Some(completer) = &importer_config.completer {
                let history = load_history(&base_dir.join(&completer.history))?;
                let completer =
                    TransactionCompleter::new(&history, importer_config.account.as_str(), completer.options.clone());
                tracing::debug!(
                    "{}: {} model transactions",
                    importer_config.account,
                    completer.models().len()
                );
                importer = importer.with_filter(completer);
            }
            importers.push(Box::new(importer));
        }
        for filing_config in &config.filings {
            let importer = FilingImporter::new(filing_config)
                .with_context(|| format!("filing importer for {}", filing_config.account))?;
            importers.push(Box::new(importer));
        }
        tracing::info!("{} importers loaded from {}", importers.len(), config_path.display());
        Ok(Importers { importers })
    }

    fn find(&self, path: &Path) -> Option<&dyn Importer> {
        self.importers
            .iter()
            .map(|importer| &**importer)
            .find(|importer| importer.identify(path))
    }

    pub fn identify<W: Write>(&self, paths: &[PathBuf], out: &mut W) -> anyhow::Result<()> {
        for path in paths {
            match self.find(path) {
                Some(importer) => writeln!(out, "{}: {}", path.display(), importer.name())?,
                None => writeln!(out, "{}: no importer", path.display())?,
            }
        }
        Ok(())
    }

    pub fn file_date<W: Write>(&self, paths: &[PathBuf], out: &mut W) -> anyhow::Result<()> {
        for path in paths {
            let Some(importer) = self.find(path) else {
                tracing::warn!("{}: no importer", path.display());
                continue;
            };
            let date = importer
                .file_date(path)
                .map_or_else(|| "-".to_string(), |date| date.to_string());
            let name = importer.file_name(path).unwrap_or_default();
            writeln!(
                out,
                "{}: {} {} {}",
                path.display(),
                date,
                importer.file_account(path),
                name
            )?;
        }
        Ok(())
    }

    /// Write the entries of every recognised file and return the diagnostics
    /// raised along the way.
    pub fn extract<W: Write>(
        &self,
        paths: &[PathBuf],
        format: OutputFormat,
        out: &mut W,
    ) -> anyhow::Result<Vec<Diagnostic>> {
        let mut extracted = Vec::new();
        for path in paths {
            match self.find(path) {
                Some(importer) => extracted.push((path, importer, importer.extract(path))),
                None => tracing::warn!("{}: no importer", path.display()),
            }
        }

        match format {
            OutputFormat::Beancount => {
                for (i, (path, _, extraction)) in extracted.iter().enumerate() {
                    if i > 0 {
                        writeln!(out)?;
                    }
                    writeln!(out, "**** {}", path.display())?;
                    writeln!(out)?;
                    render(out, &extraction.entries)?;
                }
            }
            OutputFormat::Json => {
                let files: Vec<FileExtraction<'_>> = extracted
                    .iter()
                    .map(|(path, importer, extraction)| FileExtraction {
                        file: path.display().to_string(),
                        importer: importer.name(),
                        extraction,
                    })
                    .collect();
                serde_json::to_writer_pretty(&mut *out, &files)?;
                writeln!(out)?;
            }
        }

        Ok(extracted
            .into_iter()
            .flat_map(|(_, _, extraction)| extraction.diagnostics)
            .collect())
    }
}

/// Ledger entries used as completion models, stored as a JSON array.
fn load_history(path: &Path) -> anyhow::Result<Vec<Directive>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading history {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing history {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use reckon_core::{Amount, Meta, Posting, Transaction};
    use rust_decimal::Decimal;

    const STATEMENT: &str = "\
04/28/2016,BELL CANADA      BPY,25.30,,2371.89
04/29/2016,CINEPLEX #9172,23.00,,2348.89
04/29/2016,CANADA           RIT,,345.24,2694.13
";

    const CONFIG: &str = r#"
[[importer]]
account = "Assets:TD:Checking"
basename = "td-checking"
first_day = 1
filename_pattern = "accountactivity"
"#;

    fn setup(config: &str) -> (tempfile::TempDir, Importers, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("importers.toml");
        fs::write(&config_path, config).unwrap();
        let statement = dir.path().join("accountactivity.csv");
        fs::write(&statement, STATEMENT).unwrap();
        let importers = Importers::load(&config_path).unwrap();
        (dir, importers, statement)
    }

    fn output(f: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut out = Vec::new();
        f(&mut out);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn identify_reports_unknown_files() {
        let (dir, importers, statement) = setup(CONFIG);
        let other = dir.path().join("visa.csv");
        let text = output(|out| importers.identify(&[statement.clone(), other.clone()], out).unwrap());
        assert_eq!(
            text,
            format!(
                "{}: TD Canada Trust: \"Assets:TD:Checking\"\n{}: no importer\n",
                statement.display(),
                other.display()
            )
        );
    }

    #[test]
    fn file_date_uses_the_statement_period() {
        let (_dir, importers, statement) = setup(CONFIG);
        let text = output(|out| importers.file_date(&[statement.clone()], out).unwrap());
        assert_eq!(
            text,
            format!("{}: 2016-04-30 Assets:TD:Checking td-checking.csv\n", statement.display())
        );
    }

    #[test]
    fn extract_as_beancount() {
        let (_dir, importers, statement) = setup(CONFIG);
        let mut diagnostics = Vec::new();
        let text = output(|out| {
            diagnostics = importers
                .extract(&[statement.clone()], OutputFormat::Beancount, out)
                .unwrap()
        });
        assert!(diagnostics.is_empty());
        assert!(text.starts_with(&format!("**** {}\n\n2016-04-28 * ", statement.display())));
        assert!(text.ends_with("2016-05-01 balance Assets:TD:Checking  2694.13 CAD\n"));
    }

    #[test]
    fn extract_as_json() {
        let (_dir, importers, statement) = setup(CONFIG);
        let text = output(|out| {
            importers
                .extract(&[statement.clone()], OutputFormat::Json, out)
                .unwrap();
        });
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let file = &value[0];
        assert_eq!(file["file"], statement.display().to_string());
        assert_eq!(file["entries"].as_array().unwrap().len(), 4);
        assert_eq!(file["entries"][3]["type"], "balance");
        assert!(file["diagnostics"].as_array().unwrap().is_empty());
    }

    #[test]
    fn completer_history_is_read_next_to_the_config() {
        let history: Vec<Directive> = vec![Transaction::new(
            Meta::new("ledger.beancount", 1),
            NaiveDate::from_ymd_opt(2016, 3, 28).unwrap(),
            "BELL CANADA      BPY",
        )
        .with_posting(Posting::new("Assets:TD:Checking", Amount::new(Decimal::new(-2530, 2), "CAD")))
        .with_posting(Posting::new("Expenses:Phone", Amount::new(Decimal::new(2530, 2), "CAD")))
        .into()];
        let config = format!(
            "{CONFIG}\n[importer.completer]\nhistory = \"history.json\"\ninterpolated = true\n"
        );

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("history.json"), serde_json::to_string(&history).unwrap()).unwrap();
        let config_path = dir.path().join("importers.toml");
        fs::write(&config_path, config).unwrap();
        let statement = dir.path().join("accountactivity.csv");
        fs::write(&statement, STATEMENT).unwrap();

        let importers = Importers::load(&config_path).unwrap();
        let text = output(|out| {
            importers
                .extract(&[statement.clone()], OutputFormat::Beancount, out)
                .unwrap();
        });
        assert!(text.contains("\"BELL CANADA      BPY\"\n  Assets:TD:Checking  -25.30 CAD\n  Expenses:Phone  25.30 CAD\n"));
    }

    #[test]
    fn filing_importers_follow_statement_importers() {
        let config = format!(
            "{CONFIG}\n[[filing]]\naccount = \"Liabilities:Amex\"\nbasename = \"amex\"\nformat = \"amex_pdf\"\n"
        );
        let (dir, importers, statement) = setup(&config);
        let pdf = dir.path().join("Statement_Apr 2016.pdf");

        let text = output(|out| importers.identify(&[statement.clone(), pdf.clone()], out).unwrap());
        assert!(text.ends_with(&format!(
            "{}: American Express PDF: \"Liabilities:Amex\"\n",
            pdf.display()
        )));

        let text = output(|out| importers.file_date(&[pdf.clone()], out).unwrap());
        assert_eq!(text, format!("{}: 2016-04-30 Liabilities:Amex amex.pdf\n", pdf.display()));

        let mut diagnostics = Vec::new();
        let text = output(|out| {
            diagnostics = importers.extract(&[pdf.clone()], OutputFormat::Beancount, out).unwrap()
        });
        assert!(diagnostics.is_empty());
        assert_eq!(text, format!("**** {}\n\n", pdf.display()));
    }

    #[test]
    fn missing_history_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("importers.toml");
        fs::write(&config_path, format!("{CONFIG}\n[importer.completer]\nhistory = \"nope.json\"\n")).unwrap();
        let err = Importers::load(&config_path).unwrap_err();
        assert!(err.to_string().starts_with("reading history"));
    }
}
