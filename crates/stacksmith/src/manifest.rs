//! collection of manifest documents
//!
//! [ManifestDocuments] stores the root blocks of every loaded `.hcl`
//! manifest together with the path they came from, and assigns each block a
//! numeric index. Indices are stable once assigned (removal is not possible)
//! and are what [crate::compose] issues point at when reporting problems.
//!
//! Root attributes are collected too, but only so compose can reject them
//! with a pointer to the offending document - a manifest consists of blocks.
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use std::path::Path;

#[derive(Default, Debug)]
pub struct ManifestDocuments {
    sources: Vec<Source>,
    root_blocks: Vec<(usize, Block)>,
    root_attributes: Vec<(usize, Attribute)>,
}

impl ManifestDocuments {
    /// Inserts and indexes a parsed manifest document
    pub fn insert(&mut self, document: Body, path: impl Into<Option<std::path::PathBuf>>) {
        let source_index = self.sources.len();
        self.sources.push(path.into());

        for structure in document.into_iter() {
            match structure {
                Structure::Block(block) => self.root_blocks.push((source_index, block)),
                Structure::Attribute(attribute) => {
                    self.root_attributes.push((source_index, attribute))
                }
            }
        }
    }

    pub fn get_block(&self, index: usize) -> SourceBlock {
        let (source_index, block) = &self.root_blocks[index];
        (index, &self.sources[*source_index], block)
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .enumerate()
            .map(|(index, (source_index, block))| (index, &self.sources[*source_index], block))
    }

    pub fn attributes(&self) -> impl Iterator<Item = SourceAttribute> {
        self.root_attributes
            .iter()
            .enumerate()
            .map(|(index, (source_index, attribute))| {
                (index, &self.sources[*source_index], attribute)
            })
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl ManifestDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading manifest");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let body = hcl_edit::parser::parse_body(&file_contents)?;

        self.insert(body, Some(file_path));
        Ok(())
    }

    /// Load every `*stack.hcl` file in a directory
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let mut any_files_loaded = false;

        let read_dir = std::fs::read_dir(dir_path)?;
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let is_manifest_file = dir_entry
                .file_name()
                .to_string_lossy()
                .ends_with("stack.hcl");
            if !is_manifest_file {
                continue;
            }

            let file_path = dir_entry.path();
            self.load_file(&file_path)?;
            any_files_loaded = true;
        }

        if !any_files_loaded {
            return Err(LoadError::NoFilesFound);
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No manifest files found in directory")]
    NoFilesFound,
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl file")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
}

impl From<Body> for ManifestDocuments {
    fn from(value: Body) -> Self {
        let mut documents = ManifestDocuments::default();
        documents.insert(value, None);
        documents
    }
}

/// Utility macro to create [ManifestDocuments]
///
/// Create from a single document
/// ```
/// # use stacksmith::manifest_documents;
/// manifest_documents!(r#"resource "s3_bucket" "uploads" {}"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use stacksmith::manifest_documents;
/// manifest_documents! {
///   "one.stack.hcl" => r#"resource "iam_role" "app" {}"#,
///   "two.stack.hcl" => r#"resource "s3_bucket" "uploads" {}"#
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use stacksmith::manifest_documents;
/// manifest_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! manifest_documents {
    // single document without source
    { $expr:expr } => {
        $crate::manifest::ManifestDocuments::from(hcl_edit::parser::parse_body($expr).expect("body must parse"))
    };
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::manifest::ManifestDocuments::default();
        $(
            docs.insert(hcl_edit::parser::parse_body($expr).expect("body must parse"), Some($source.into()));
        )+

        docs
    }};
}

pub type Source = Option<std::path::PathBuf>;
pub type SourceBlock<'a> = (usize, &'a Source, &'a Block);
pub type SourceAttribute<'a> = (usize, &'a Source, &'a Attribute);
