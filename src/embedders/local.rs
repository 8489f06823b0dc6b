//! Local ONNX embedders backed by fastembed.

use std::path::PathBuf;

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use serde::Deserialize;

use crate::embedders::{
    EmbeddingError, EmbeddingResult, ImageEmbedder, TextEmbedder, init_with_fallback,
};

/// Text models that handle Korean product titles.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TextModel {
    MultilingualE5Large,
    MultilingualE5Base,
    MultilingualE5Small,
    ParaphraseMultilingualMpnet,
}

impl TextModel {
    fn as_fastembed(self) -> EmbeddingModel {
        match self {
            TextModel::MultilingualE5Large => EmbeddingModel::MultilingualE5Large,
            TextModel::MultilingualE5Base => EmbeddingModel::MultilingualE5Base,
            TextModel::MultilingualE5Small => EmbeddingModel::MultilingualE5Small,
            TextModel::ParaphraseMultilingualMpnet => EmbeddingModel::ParaphraseMLMpnetBaseV2,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageModel {
    ClipVitB32,
    Resnet50,
    UnicomVitB16,
}

impl ImageModel {
    fn as_fastembed(self) -> ImageEmbeddingModel {
        match self {
            ImageModel::ClipVitB32 => ImageEmbeddingModel::ClipVitB32,
            ImageModel::Resnet50 => ImageEmbeddingModel::Resnet50,
            ImageModel::UnicomVitB16 => ImageEmbeddingModel::UnicomVitB16,
        }
    }
}

pub struct LocalTextEmbedder {
    name: String,
    model: TextEmbedding,
    batch_size: Option<usize>,
}

impl LocalTextEmbedder {
    pub fn try_new(
        model: TextModel,
        cache_dir: Option<PathBuf>,
        batch_size: Option<usize>,
    ) -> EmbeddingResult<Self> {
        let mut options = InitOptions::new(model.as_fastembed());
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let embedding = TextEmbedding::try_new(options).map_err(|error| EmbeddingError::Init {
            model: format!("{model:?}"),
            message: format!("{error:?}"),
        })?;
        Ok(Self {
            name: format!("{model:?}"),
            model: embedding,
            batch_size,
        })
    }

    /// Load the first model of `models` that initializes.
    pub fn first_available(
        models: &[TextModel],
        cache_dir: Option<PathBuf>,
        batch_size: Option<usize>,
    ) -> EmbeddingResult<Self> {
        init_with_fallback(models, |model| {
            Self::try_new(model, cache_dir.clone(), batch_size)
        })
        .map(|(_, embedder)| embedder)
    }
}

impl TextEmbedder for LocalTextEmbedder {
    fn embed(&mut self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.model
            .embed(texts.to_vec(), self.batch_size)
            .map_err(|error| EmbeddingError::Embed(format!("{error:?}")))
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

pub struct LocalImageEmbedder {
    name: String,
    model: ImageEmbedding,
    batch_size: Option<usize>,
}

impl LocalImageEmbedder {
    pub fn try_new(
        model: ImageModel,
        cache_dir: Option<PathBuf>,
        batch_size: Option<usize>,
    ) -> EmbeddingResult<Self> {
        let mut options = ImageInitOptions::new(model.as_fastembed());
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let embedding =
            ImageEmbedding::try_new(options).map_err(|error| EmbeddingError::Init {
                model: format!("{model:?}"),
                message: format!("{error:?}"),
            })?;
        Ok(Self {
            name: format!("{model:?}"),
            model: embedding,
            batch_size,
        })
    }

    pub fn first_available(
        models: &[ImageModel],
        cache_dir: Option<PathBuf>,
        batch_size: Option<usize>,
    ) -> EmbeddingResult<Self> {
        init_with_fallback(models, |model| {
            Self::try_new(model, cache_dir.clone(), batch_size)
        })
        .map(|(_, embedder)| embedder)
    }
}

impl ImageEmbedder for LocalImageEmbedder {
    fn embed_images(&mut self, images: &[Vec<u8>]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if images.is_empty() {
            return Ok(vec![]);
        }
        let slices: Vec<&[u8]> = images.iter().map(Vec::as_slice).collect();
        self.model
            .embed_bytes(&slices, self.batch_size)
            .map_err(|error| EmbeddingError::Embed(format!("{error:?}")))
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
