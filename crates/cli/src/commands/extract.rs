//! Extract command handler.
//!
//! Runs the chunked, sequential field extraction over one document.

use clap::Args;
use docfields_core::config::ProviderConfig;
use docfields_core::{config::AppConfig, AppError, AppResult};
use docfields_extract::{
    CancelFlag, ExtractionRequest, Extractor, ExtractorConfig, FieldSpec, TiktokenTokenizer,
};
use docfields_history::{HistoryKind, HistoryStore};
use docfields_llm::create_client;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Extract fields from a document
#[derive(Args, Debug)]
pub struct ExtractCommand {
    /// Path to the document file ("-" or omitted reads stdin)
    pub file: Option<PathBuf>,

    /// Document type fed into the extraction instructions
    #[arg(short = 't', long, default_value = "document")]
    pub doc_type: String,

    /// Fields to extract: a JSON object or a comma/newline-separated list
    /// of names (default: the most recent submission)
    #[arg(short, long)]
    pub fields: Option<String>,

    /// Extraction guidelines (default: the most recent submission)
    #[arg(short, long)]
    pub guideline: Option<String>,

    /// Model whose vocabulary sizes chunks (default: the completion model)
    #[arg(long)]
    pub tokenizer_model: Option<String>,

    /// Maximum tokens the service may generate per call
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Temperature for response generation (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output as JSON with run metadata
    #[arg(long)]
    pub json: bool,
}

impl ExtractCommand {
    /// Execute the extract command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing extract command");
        tracing::debug!("Extract command options: {:?}", self);

        config.validate()?;

        let document = self.read_document()?;
        tracing::debug!("Read document ({} bytes)", document.len());

        // Fields and guidelines submitted on this run are recorded; omitted
        // ones fall back to the most recent earlier submission.
        let store = HistoryStore::open(&config.history_db_path())?;
        let fields = self.resolve_fields(&store)?;
        let guideline = self.resolve_guideline(&store)?;

        // Chunk sizing must use the vocabulary of the model that will see
        // the prompt, unless explicitly overridden.
        let tokenizer_model = self.tokenizer_model.as_deref().unwrap_or(&config.model);
        let tokenizer = TiktokenTokenizer::for_model(tokenizer_model)?;

        let provider_config = config.get_provider_config(&config.provider)?;
        let endpoint = match provider_config {
            Some(ProviderConfig::Ollama { ref endpoint, .. }) => Some(endpoint.clone()),
            Some(ProviderConfig::OpenAI { ref endpoint, .. }) => endpoint.clone(),
            None => None,
        };
        let api_key = config.resolve_api_key(&config.provider)?;
        let client = create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())?;

        let mut extractor_config = ExtractorConfig {
            model: config.model.clone(),
            token_budget: config.token_budget,
            call_timeout: Duration::from_secs(config.call_timeout_secs),
            max_retries: config.max_retries,
            ..ExtractorConfig::default()
        };
        if let Some(max_tokens) = self.max_tokens {
            extractor_config.max_output_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            extractor_config.temperature = temperature;
        }

        let extractor = Extractor::new(client, Arc::new(tokenizer), extractor_config)?;

        // A long document spans many sequential calls; Ctrl-C stops the run
        // at the next chunk boundary instead of mid-call.
        let cancel = CancelFlag::new();
        let signal_flag = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; stopping before the next chunk");
                signal_flag.cancel();
            }
        });

        let request = ExtractionRequest {
            doc_type: self.doc_type.clone(),
            document,
            guideline,
            fields,
        };

        match extractor.extract(&request, &cancel).await {
            Ok(outcome) => {
                if self.json {
                    let output = serde_json::json!({
                        "fields": outcome.fields,
                        "chunkCount": outcome.chunk_count,
                        "model": outcome.model,
                        "provider": config.provider,
                        "elapsedMs": outcome.elapsed_ms,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    println!("{}", outcome.fields.to_json_pretty());
                }
                Ok(())
            }
            Err(err) => {
                if let Some(partial) = err.partial_fields() {
                    eprintln!("Partial result (last completed chunk):");
                    eprintln!("{}", partial.to_json_pretty());
                }
                Err(AppError::Extraction(err.to_string()))
            }
        }
    }

    /// Read the document from the file argument or stdin.
    fn read_document(&self) -> AppResult<String> {
        match self.file.as_deref() {
            Some(path) if path != std::path::Path::new("-") => {
                Ok(std::fs::read_to_string(path)?)
            }
            _ => {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                Ok(buffer)
            }
        }
    }

    /// Resolve the field spec from the CLI flag or the submission history.
    ///
    /// A spec supplied on the command line is recorded in canonical JSON
    /// form. An empty spec is passed through; the extractor rejects it
    /// before making any completion call.
    fn resolve_fields(&self, store: &HistoryStore) -> AppResult<FieldSpec> {
        if let Some(ref text) = self.fields {
            let spec = FieldSpec::parse(text).ok_or_else(|| {
                AppError::Config(format!("Could not parse field spec: {:?}", text))
            })?;
            store.append(HistoryKind::Fields, &spec.to_json())?;
            return Ok(spec);
        }

        match store.latest(HistoryKind::Fields)? {
            Some(body) => {
                tracing::info!("Using field spec from submission history");
                FieldSpec::parse(&body).ok_or_else(|| {
                    AppError::History(format!("Stored field spec is unusable: {:?}", body))
                })
            }
            None => Ok(FieldSpec::default()),
        }
    }

    /// Resolve the guideline from the CLI flag or the submission history.
    /// Missing guidelines are tolerated; extraction runs without them.
    fn resolve_guideline(&self, store: &HistoryStore) -> AppResult<String> {
        if let Some(ref guideline) = self.guideline {
            if !guideline.trim().is_empty() {
                store.append(HistoryKind::Guideline, guideline)?;
            }
            return Ok(guideline.clone());
        }

        match store.latest(HistoryKind::Guideline)? {
            Some(body) => {
                tracing::info!("Using guideline from submission history");
                Ok(body)
            }
            None => Ok(String::new()),
        }
    }
}
