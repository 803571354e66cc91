//! Command line definition.

use clap::{Args, Parser, Subcommand, ValueEnum};
use storefront_indexer_repository::IndexCriterion;

use crate::config::SourceSystem;
use crate::importer::{ImportOptions, CMS_ENTITY_TYPES};

#[derive(Parser, Debug)]
#[command(name = "storefront-indexer", version)]
#[command(about = "Manage versioned storefront search indices and import documents into them")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show index versions and which one is latest, aliased and selected
    Info,
    /// Create the next index version and apply all mappings
    CreateIndex,
    /// Delete one index version
    DeleteIndex(IndexArgs),
    /// Delete every index version of the prefix
    DeleteAllIndices,
    /// Copy an index (the aliased one by default) into a new version and alias it
    Reindex(IndexArgs),
    /// Put all mappings on an index version
    UpdateMappings(IndexArgs),
    /// Persist the index used by later commands
    SelectIndex(IndexArgs),
    /// Point the public alias at an index version
    AliasIndex(IndexArgs),
    /// Show the progress of a background reindex
    Task {
        task_id: String,
    },
    /// Import documents from an upstream system
    Import(ImportArgs),
}

/// Index designation; the selected index when no flag is given.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
#[group(multiple = false)]
pub struct IndexArgs {
    /// Index version id
    #[arg(long, short = 'i')]
    pub id: Option<u64>,
    /// Full index name
    #[arg(long, short = 'n')]
    pub name: Option<String>,
    /// The highest index version
    #[arg(long)]
    pub latest: bool,
    /// The index holding the public alias
    #[arg(long, short = 'a')]
    pub aliased: bool,
    /// The persisted selection
    #[arg(long)]
    pub selected: bool,
}

impl IndexArgs {
    /// The criterion given on the command line, if any.
    pub fn explicit(&self) -> Option<IndexCriterion> {
        if let Some(id) = self.id {
            Some(IndexCriterion::Id(id))
        } else if let Some(name) = &self.name {
            Some(IndexCriterion::Name(name.clone()))
        } else if self.latest {
            Some(IndexCriterion::Latest)
        } else if self.aliased {
            Some(IndexCriterion::Aliased)
        } else if self.selected {
            Some(IndexCriterion::Selected)
        } else {
            None
        }
    }

    pub fn criterion(&self) -> IndexCriterion {
        self.explicit().unwrap_or(IndexCriterion::Selected)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportTarget {
    Attributes,
    Taxrules,
    Categories,
    Products,
    Cms,
    Storyblok,
}

impl ImportTarget {
    pub fn source_system(self) -> SourceSystem {
        match self {
            ImportTarget::Storyblok => SourceSystem::Storyblok,
            _ => SourceSystem::VsBridge,
        }
    }

    /// Entity types imported for this target, in order.
    pub fn entity_types(self, cms: &CmsParts) -> Vec<&'static str> {
        match self {
            ImportTarget::Attributes => vec!["attribute"],
            ImportTarget::Taxrules => vec!["taxrule"],
            ImportTarget::Categories => vec!["category"],
            ImportTarget::Products => vec!["product"],
            ImportTarget::Storyblok => vec!["cms_storyblok"],
            ImportTarget::Cms if cms.pages => vec!["cms_page"],
            ImportTarget::Cms if cms.blocks => vec!["cms_block"],
            ImportTarget::Cms if cms.hierarchy => vec!["cms_hierarchy"],
            ImportTarget::Cms => CMS_ENTITY_TYPES.to_vec(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    pub target: ImportTarget,

    #[command(flatten)]
    pub index: IndexArgs,

    /// First page to fetch
    #[arg(long, short = 'p', default_value_t = 1)]
    pub page: u32,

    /// Documents per page
    #[arg(long, short = 'l', default_value_t = 25)]
    pub page_size: u32,

    /// Write records one at a time
    #[arg(long, short = 's')]
    pub serial: bool,

    /// Upper bound on concurrent writes per page
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    #[command(flatten)]
    pub cms: CmsParts,
}

impl ImportArgs {
    pub fn options(&self) -> ImportOptions {
        ImportOptions {
            start_page: self.page,
            page_size: self.page_size,
            concurrent: !self.serial,
            max_in_flight: self.max_in_flight,
        }
    }
}

/// Restrict `import cms` to one part.
#[derive(Args, Debug, Clone, Default)]
#[group(multiple = false)]
pub struct CmsParts {
    #[arg(long)]
    pub pages: bool,
    #[arg(long)]
    pub blocks: bool,
    #[arg(long)]
    pub hierarchy: bool,
}
