//! Fan-out over many files and languages.
//! Every task returns its own [`Report`]; the reports are merged at the end.

use crate::report::Report;
use crate::srt;
use crate::translate::{translate_file, TranslateOptions, Translator};
use crate::validate::validate;
use futures::stream::{self, StreamExt};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Translate every file into every language and validate each output.
pub async fn translate_all<T>(
    files: &[PathBuf],
    output_dir: &Path,
    languages: &[String],
    translator: T,
    options: &TranslateOptions,
) -> Report
where
    T: Translator + 'static,
{
    let tasks: Vec<(PathBuf, String)> = languages
        .iter()
        .flat_map(|lang| files.iter().map(move |f| (f.clone(), lang.clone())))
        .collect();
    let total = tasks.len();
    info!("translating {} file(s) into {} language(s)", files.len(), languages.len());

    let reports: Vec<Report> = stream::iter(tasks.into_iter().enumerate())
        .map(|(n, (file, lang))| {
            let translator = translator.clone();
            async move {
                let mut report = Report::default();
                match translate_file(&file, output_dir, &lang, translator, options).await {
                    Ok(outcome) => report.push_result(outcome.validation),
                    Err(err) => {
                        warn!("failed: {} [{lang}]: {err:#}", file.display());
                        report.push_failure(&display_name(&file), &lang, format!("{err:#}"));
                    }
                }
                info!("progress {}/{}", n + 1, total);
                report
            }
        })
        .buffered(options.parallel_files.max(1))
        .collect()
        .await;
    reports.into_iter().collect()
}

/// Validate already written translations. `pairs` holds `(source, translation)`.
pub fn validate_all(pairs: &[(PathBuf, PathBuf)], language: &str) -> Report {
    pairs
        .iter()
        .map(|(source, candidate)| {
            let mut report = Report::default();
            let name = display_name(source);
            let read = |p: &Path| fs::read(p).map(|b| String::from_utf8_lossy(&b).to_string());
            match (read(source.as_path()), read(candidate.as_path())) {
                (Ok(en), Ok(tg)) => {
                    let result = validate(&srt::parse(&en), &srt::parse(&tg), &name, language);
                    report.push_result(result)
                }
                (Err(err), _) => report.push_failure(
                    &name,
                    language,
                    format!("cannot read {}: {err}", source.display()),
                ),
                (_, Err(err)) => report.push_failure(
                    &name,
                    language,
                    format!("cannot read {}: {err}", candidate.display()),
                ),
            }
            report
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::find_pairs;
    use crate::retry::TranslateError;
    use crate::translate::IndexedLine;
    use crate::validate::IssueType;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::tempdir;

    const EN: &str = concat!(
        "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n",
        "2\n00:00:03,000 --> 00:00:04,000\nBye\n",
    );

    #[derive(Clone)]
    struct EchoTr;

    #[async_trait]
    impl Translator for EchoTr {
        async fn translate_batch(
            &self,
            lines: &[IndexedLine],
            target_language: &str,
        ) -> Result<Vec<IndexedLine>, TranslateError> {
            Ok(lines
                .iter()
                .map(|l| IndexedLine {
                    index: l.index,
                    text: format!("{target_language}:{}", l.text),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn translates_every_pair_and_collects_failures() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("ep1_EN.srt"), EN).unwrap();
        let files = vec![src.join("ep1_EN.srt"), src.join("missing.srt")];
        let options = TranslateOptions {
            backoff_unit: Duration::ZERO,
            ..TranslateOptions::default()
        };
        let langs = vec!["Thai".to_string(), "Malay".to_string()];

        let report = translate_all(&files, &dir.path().join("out"), &langs, EchoTr, &options).await;
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|r| r.passed));
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].filename, "missing.srt");
        assert!(dir.path().join("out/Malay/ep1_MALAY.srt").exists());
    }

    #[test]
    fn validates_existing_translations() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("ep1.srt");
        fs::write(&src, EN).unwrap();
        fs::create_dir_all(dir.path().join("Thai")).unwrap();
        fs::write(
            dir.path().join("Thai").join("ep1_THAI.srt"),
            "1\n00:00:01,000 --> 00:00:02,000\nSawasdee\n",
        )
        .unwrap();
        let other = dir.path().join("ep2.srt");
        fs::write(&other, EN).unwrap();

        let pairs = find_pairs(&[src, other], dir.path(), "Thai");
        let report = validate_all(&pairs, "Thai");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].issues[0].issue_type, IssueType::BlockCountMismatch);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].filename, "ep2.srt");
        assert_eq!(report.summary().failed, 2);
    }
}
