//! Text to speech through gTTS, with an ffmpeg pitch shift for the male voice.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::config::SpeechConfig;
use crate::convert::{
    ensure_produced, move_into_place, CommandRunner, Converter, Job, JobOptions, Outcome,
};
use crate::error::{Error, Result};

/// Language value that defers to the configured default.
pub const AUTO_LANGUAGE: &str = "auto";

/// Voice requested for synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Voice {
    #[default]
    Female,
    Male,
}

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Voice::Female => "female",
            Voice::Male => "male",
        }
    }

    /// Lenient parse: anything but `male` is the female voice.
    pub fn from_request(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()) {
            Some(v) if v == "male" => Voice::Male,
            _ => Voice::Female,
        }
    }
}

/// What to say and how.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Voice,
    /// Language code, or `auto` to speak the language the text is written in.
    pub language: String,
}

/// Source of the languages the synthesizer supports, keyed by code.
#[async_trait]
pub trait LanguageCatalog: Send + Sync {
    async fn languages(&self) -> Result<BTreeMap<String, String>>;
}

/// Fixed catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog(pub BTreeMap<String, String>);

impl StaticCatalog {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[async_trait]
impl LanguageCatalog for StaticCatalog {
    async fn languages(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.0.clone())
    }
}

/// Catalog read once from `gtts-cli --all`.
pub struct GttsCatalog {
    runner: CommandRunner,
    gtts: String,
    cache: OnceCell<BTreeMap<String, String>>,
}

impl GttsCatalog {
    pub fn new(runner: CommandRunner, gtts: String) -> Self {
        Self {
            runner,
            gtts,
            cache: OnceCell::new(),
        }
    }
}

#[async_trait]
impl LanguageCatalog for GttsCatalog {
    async fn languages(&self) -> Result<BTreeMap<String, String>> {
        let languages = self
            .cache
            .get_or_try_init(|| async {
                let stdout = self.runner.run(&self.gtts, &["--all"]).await?;
                let languages = parse_language_list(&stdout);
                if languages.is_empty() {
                    return Err(Error::Conversion("gTTS reported no languages".into()));
                }
                tracing::debug!(count = languages.len(), "speech languages loaded");
                Ok::<_, Error>(languages)
            })
            .await?;
        Ok(languages.clone())
    }
}

/// Parse `code: Name` lines.
pub fn parse_language_list(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(code, name)| (code.trim(), name.trim()))
        .filter(|(code, name)| !code.is_empty() && !name.is_empty() && !code.contains(' '))
        .map(|(code, name)| (code.to_string(), name.to_string()))
        .collect()
}

fn is_auto(language: &str) -> bool {
    let language = language.trim();
    language.is_empty() || language.eq_ignore_ascii_case(AUTO_LANGUAGE)
}

/// gTTS code for an ISO 639-3 code reported by the detector.
fn gtts_code(iso639_3: &str) -> Option<&'static str> {
    let code = match iso639_3 {
        "afr" => "af",
        "amh" => "am",
        "ara" => "ar",
        "bel" => "be",
        "ben" => "bn",
        "bul" => "bg",
        "cat" => "ca",
        "ces" => "cs",
        "cmn" => "zh-CN",
        "dan" => "da",
        "deu" => "de",
        "ell" => "el",
        "eng" => "en",
        "epo" => "eo",
        "est" => "et",
        "fin" => "fi",
        "fra" => "fr",
        "guj" => "gu",
        "heb" => "iw",
        "hin" => "hi",
        "hrv" => "hr",
        "hun" => "hu",
        "ind" => "id",
        "ita" => "it",
        "jav" => "jw",
        "jpn" => "ja",
        "kan" => "kn",
        "khm" => "km",
        "kor" => "ko",
        "lat" => "la",
        "lav" => "lv",
        "lit" => "lt",
        "mal" => "ml",
        "mar" => "mr",
        "mkd" => "mk",
        "mya" => "my",
        "nep" => "ne",
        "nld" => "nl",
        "nob" => "no",
        "pan" => "pa",
        "pol" => "pl",
        "por" => "pt",
        "ron" => "ro",
        "rus" => "ru",
        "sin" => "si",
        "slk" => "sk",
        "slv" => "sl",
        "spa" => "es",
        "srp" => "sr",
        "swe" => "sv",
        "tam" => "ta",
        "tel" => "te",
        "tgl" => "tl",
        "tha" => "th",
        "tur" => "tr",
        "ukr" => "uk",
        "urd" => "ur",
        "vie" => "vi",
        _ => return None,
    };
    Some(code)
}

/// Language `text` is written in, as a gTTS code.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let info = whatlang::detect(text)?;
    gtts_code(info.lang().code())
}

/// Resolve the requested language against `supported`.
///
/// `auto` takes the `detected` language when gTTS can speak it and
/// `default` otherwise.
pub fn resolve_language(
    requested: &str,
    detected: Option<&str>,
    default: &str,
    supported: &BTreeMap<String, String>,
) -> Result<String> {
    let requested = requested.trim();
    if is_auto(requested) {
        let language = detected
            .filter(|code| supported.contains_key(*code))
            .unwrap_or(default);
        return Ok(language.to_string());
    }
    if supported.contains_key(requested) {
        return Ok(requested.to_string());
    }

    let codes: Vec<&str> = supported.keys().map(String::as_str).collect();
    Err(Error::BadRequest(format!(
        "Invalid language code. Supported: {}",
        codes.join(", ")
    )))
}

/// Decides which language a request is spoken in.
///
/// Text is never translated: an explicit language that differs from the
/// text's own is used as given.
pub struct LanguageResolver {
    catalog: Arc<dyn LanguageCatalog>,
    default_language: String,
}

impl LanguageResolver {
    pub fn new(catalog: Arc<dyn LanguageCatalog>, default_language: impl Into<String>) -> Self {
        Self {
            catalog,
            default_language: default_language.into(),
        }
    }

    pub async fn supported(&self) -> Result<BTreeMap<String, String>> {
        self.catalog.languages().await
    }

    /// Concrete language code for speaking `text` in `requested`.
    pub async fn resolve(&self, requested: &str, text: &str) -> Result<String> {
        let supported = self.catalog.languages().await?;
        let detected = detect_language(text);
        let language = resolve_language(requested, detected, &self.default_language, &supported)?;

        if detected.is_some_and(|d| d != language) {
            tracing::debug!(?detected, language = %language, "text spoken in another language");
        }
        Ok(language)
    }
}

/// ffmpeg filter lowering pitch by `octaves` while keeping `sample_rate`.
pub fn pitch_filter(sample_rate: u32, octaves: f64) -> String {
    let shifted = (f64::from(sample_rate) * 2f64.powf(octaves)) as u32;
    format!("asetrate={},aresample={}", shifted, sample_rate)
}

/// Synthesizes speech to MP3.
pub struct SpeechSynthesizer {
    runner: CommandRunner,
    gtts: String,
    ffmpeg: String,
    languages: Arc<LanguageResolver>,
    config: SpeechConfig,
}

impl SpeechSynthesizer {
    pub fn new(
        runner: CommandRunner,
        gtts: String,
        ffmpeg: String,
        languages: Arc<LanguageResolver>,
        config: SpeechConfig,
    ) -> Self {
        Self {
            runner,
            gtts,
            ffmpeg,
            languages,
            config,
        }
    }
}

#[async_trait]
impl Converter for SpeechSynthesizer {
    async fn convert(&self, job: &Job) -> Result<Outcome> {
        let request = match &job.options {
            JobOptions::Speech(request) => request,
            _ => return Err(Error::BadRequest("Provide text or a .txt file.".into())),
        };
        if request.text.trim().is_empty() {
            return Err(Error::BadRequest("Provide text or a .txt file.".into()));
        }

        let language = self
            .languages
            .resolve(&request.language, &request.text)
            .await?;

        let scratch = job.scratch_dir()?;
        let text_path = scratch.path().join("input.txt");
        let speech_path = scratch.path().join("speech.mp3");
        tokio::fs::write(&text_path, request.text.trim()).await?;

        let mut args: Vec<OsString> = vec!["--lang".into(), language.clone().into()];
        args.push("--output".into());
        args.push(speech_path.as_os_str().to_owned());
        args.push("--file".into());
        args.push(text_path.as_os_str().to_owned());
        self.runner.run(&self.gtts, &args).await?;

        match request.voice {
            Voice::Female => move_into_place(&speech_path, &job.output).await?,
            Voice::Male => {
                let filter = pitch_filter(self.config.sample_rate, self.config.male_pitch_octaves);
                let mut args: Vec<OsString> = vec!["-y".into(), "-i".into()];
                args.push(speech_path.as_os_str().to_owned());
                args.push("-af".into());
                args.push(filter.into());
                args.push(job.output.as_os_str().to_owned());
                self.runner.run(&self.ffmpeg, &args).await?;
            }
        }

        tracing::debug!(language = %language, voice = ?request.voice, "speech synthesized");
        ensure_produced(&job.output).await?;
        Ok(Outcome::Written)
    }
}
