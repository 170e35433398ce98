use anyhow::{anyhow, bail, Result};
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::api::sync::Api;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::{PaddingParams, Tokenizer};
use tracing::{info, info_span};

/// Turns a batch of texts into fixed-width vectors.
pub trait Embedder {
    /// Width of every vector returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// BERT encoder pulled from the Hugging Face hub, CLS pooled and L2 normalized.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl BertEmbedder {
    pub fn load(model_id: &str) -> Result<Self> {
        let span = info_span!("load_model", model_id).entered();

        let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
        info!("Device in use: {}", check_device(&device));

        let api = Api::new()?;
        let repo = api.model(model_id.to_string());

        let config_path = repo.get("config.json")?;
        let tokenizer_source = tokenizer_source(|file| Ok(repo.get(file)?))?;

        let raw_config = std::fs::read_to_string(config_path)?;
        let bert_config: Config = serde_json::from_str(&raw_config)?;
        let dimension = hidden_size(&raw_config)?;

        let vb = if let Ok(model_path) = repo.get("model.safetensors") {
            VarBuilder::from_tensors(
                candle_core::safetensors::load(model_path, &device)?,
                DType::F32,
                &device,
            )
        } else {
            info!("No safetensors weights, falling back to pytorch_model.bin");
            VarBuilder::from_pth(repo.get("pytorch_model.bin")?, DType::F32, &device)?
        };

        info!("Loading model and tokenizer...");
        let model = BertModel::load(vb, &bert_config)?;

        let mut tokenizer = match tokenizer_source {
            TokenizerSource::Json(path) => Tokenizer::from_file(path)
                .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?,
            TokenizerSource::Vocab(path) => {
                info!("No tokenizer.json, building WordPiece tokenizer from vocab.txt");
                let lowercase = repo
                    .get("tokenizer_config.json")
                    .ok()
                    .and_then(|p| std::fs::read_to_string(p).ok())
                    .map_or(Ok(true), |raw| lowercase_flag(&raw))?;
                wordpiece_tokenizer(&path, lowercase)?
            }
        };
        tokenizer.with_padding(Some(PaddingParams::default()));

        info!(dimension, "Model ready");
        span.exit();

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }
}

impl Embedder for BertEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let span = info_span!("embed", batch = texts.len()).entered();
        let start = std::time::Instant::now();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

        let mut input_ids = Vec::with_capacity(encodings.len());
        let mut attention_mask = Vec::with_capacity(encodings.len());
        let mut token_type_ids = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            input_ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            attention_mask.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
            token_type_ids.push(Tensor::new(encoding.get_type_ids(), &self.device)?);
        }
        let input_ids = Tensor::stack(&input_ids, 0)?;
        let attention_mask = Tensor::stack(&attention_mask, 0)?;
        let token_type_ids = Tensor::stack(&token_type_ids, 0)?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // CLS token of every sequence: [batch, hidden]
        let cls = hidden.i((.., 0))?;
        let norm = cls.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = cls.broadcast_div(&norm)?;
        let vectors = normalized.to_vec2::<f32>()?;

        info!(elapsed = ?start.elapsed(), "Computed embeddings");
        span.exit();
        Ok(vectors)
    }
}

#[derive(Deserialize)]
struct ModelShape {
    hidden_size: usize,
}

// `bert::Config` keeps its fields private
fn hidden_size(raw_config: &str) -> Result<usize> {
    let shape: ModelShape = serde_json::from_str(raw_config)?;
    if shape.hidden_size == 0 {
        bail!("Model config has a zero hidden_size");
    }
    Ok(shape.hidden_size)
}

/// Where the tokenizer comes from: a serialized `tokenizer.json`, or a plain
/// BERT `vocab.txt` for older hub repos.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenizerSource {
    Json(PathBuf),
    Vocab(PathBuf),
}

fn tokenizer_source(fetch: impl Fn(&str) -> Result<PathBuf>) -> Result<TokenizerSource> {
    match fetch("tokenizer.json") {
        Ok(path) => Ok(TokenizerSource::Json(path)),
        Err(json_err) => fetch("vocab.txt").map(TokenizerSource::Vocab).map_err(|vocab_err| {
            anyhow!(
                "Model has neither tokenizer.json ({}) nor vocab.txt ({})",
                json_err,
                vocab_err
            )
        }),
    }
}

#[derive(Deserialize)]
struct TokenizerFlags {
    #[serde(default = "lowercase_by_default")]
    do_lower_case: bool,
}

const fn lowercase_by_default() -> bool {
    true
}

fn lowercase_flag(raw_tokenizer_config: &str) -> Result<bool> {
    let flags: TokenizerFlags = serde_json::from_str(raw_tokenizer_config)?;
    Ok(flags.do_lower_case)
}

/// BERT WordPiece pipeline: normalizer, whitespace/punctuation split, `[CLS] .. [SEP]`.
fn wordpiece_tokenizer(vocab_path: &Path, lowercase: bool) -> Result<Tokenizer> {
    let vocab = vocab_path
        .to_str()
        .ok_or_else(|| anyhow!("Vocab path is not valid UTF-8: {}", vocab_path.display()))?;
    let model = WordPiece::from_file(vocab)
        .unk_token("[UNK]".to_string())
        .build()
        .map_err(|e| anyhow!("Failed to read vocab {}: {}", vocab, e))?;

    let mut tokenizer = Tokenizer::new(model);
    let special_id = |token: &str| {
        tokenizer
            .token_to_id(token)
            .ok_or_else(|| anyhow!("Vocab has no {} token", token))
    };
    let cls = special_id("[CLS]")?;
    let sep = special_id("[SEP]")?;

    tokenizer
        .with_normalizer(Some(BertNormalizer::new(true, true, None, lowercase)))
        .with_pre_tokenizer(Some(BertPreTokenizer))
        .with_post_processor(Some(BertProcessing::new(
            ("[SEP]".to_string(), sep),
            ("[CLS]".to_string(), cls),
        )));
    Ok(tokenizer)
}

fn check_device(device: &Device) -> String {
    match device {
        Device::Cpu => "Running on CPU".to_string(),
        Device::Cuda(n) => format!("Running on CUDA GPU {:?}", n),
        Device::Metal(_) => "Running on Metal".to_string(),
    }
}
