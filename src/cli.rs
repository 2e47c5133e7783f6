//! Command-line interface for posting a recipe with media attachments.

use clap::Parser;
use std::path::PathBuf;

use crate::config::UploaderConfig;
use crate::recipe::RecipeForm;

#[derive(Debug, Parser)]
#[command(name = "recipe-uploader", version, about = "Upload media and post a recipe")]
pub struct Cli {
    /// Config file to use instead of the one in the user config directory
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Recipe title
    #[arg(long)]
    pub title: String,

    /// Optional caption shown under the media
    #[arg(long)]
    pub caption: Option<String>,

    /// Ingredient line (repeatable)
    #[arg(long = "ingredient")]
    pub ingredients: Vec<String>,

    /// Preparation step (repeatable)
    #[arg(long = "step")]
    pub steps: Vec<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Override the number of concurrent uploads
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Images and videos to attach, in display order
    #[arg(required = true)]
    pub media: Vec<String>,
}

impl Cli {
    pub fn apply_overrides(&self, mut config: UploaderConfig) -> UploaderConfig {
        if let Some(concurrency) = self.concurrency {
            config.max_concurrent_uploads = concurrency;
        }
        config
    }

    pub fn recipe_form(&self) -> RecipeForm {
        RecipeForm {
            title: self.title.clone(),
            caption: self.caption.clone(),
            ingredients: self.ingredients.clone(),
            steps: self.steps.clone(),
            tags: self.tags.clone(),
        }
    }
}
