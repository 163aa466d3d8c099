use anchorage_config::Config;
use anchorage_engine::{
    Annotation, AttachmentLedger, DocumentTree, ElementTree, LedgerDelta, NodeId,
    ResolutionMethod, create_fingerprint, io, reattach_annotations, text::truncate_chars,
};
use anyhow::Result;
use ratatui::widgets::ListState;
use std::path::PathBuf;

/// Elements listed as annotatable blocks.
const BLOCK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "pre", "blockquote", "table", "hr",
];

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnnotationStatus {
    Attached {
        method: ResolutionMethod,
        score: f64,
        /// Index into the block list, if the node is one of the listed blocks.
        block: Option<usize>,
    },
    Orphaned,
}

pub struct Block {
    pub node: NodeId,
    pub label: String,
}

pub struct App {
    pub document_path: PathBuf,
    pub annotations_path: PathBuf,
    config: Config,
    tree: ElementTree,
    pub blocks: Vec<Block>,
    pub block_list_state: ListState,
    pub annotations: Vec<Annotation>,
    pub statuses: Vec<AnnotationStatus>,
    ledger: AttachmentLedger,
    pub message: String,
}

impl App {
    pub fn new(document_path: PathBuf, annotations_path: PathBuf, config: Config) -> Result<Self> {
        let tree = io::read_document(&document_path)?;
        let annotations = io::load_annotations(&annotations_path)?;

        let mut app = Self {
            document_path,
            annotations_path,
            config,
            tree,
            blocks: Vec::new(),
            block_list_state: ListState::default(),
            annotations,
            statuses: Vec::new(),
            ledger: AttachmentLedger::new(),
            message: String::new(),
        };
        app.rebuild_blocks();
        let delta = app.reattach();
        app.message = format!(
            "Loaded {} annotations, {} attached",
            app.annotations.len(),
            delta.newly_attached.len()
        );

        Ok(app)
    }

    pub fn next_block(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let i = match self.block_list_state.selected() {
            Some(i) => (i + 1) % self.blocks.len(),
            None => 0,
        };
        self.block_list_state.select(Some(i));
    }

    pub fn previous_block(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let i = match self.block_list_state.selected() {
            Some(i) => {
                if i == 0 {
                    self.blocks.len() - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.block_list_state.select(Some(i));
    }

    /// Fingerprint the selected block and store it as a new annotation.
    pub fn annotate_selected(&mut self) -> Result<()> {
        let Some(block) = self
            .block_list_state
            .selected()
            .and_then(|index| self.blocks.get(index))
        else {
            self.message = "No block selected".to_string();
            return Ok(());
        };

        let anchor = create_fingerprint(&self.tree, block.node, &self.config.fingerprint);
        log::debug!("created anchor {}", anchor.selector);
        let annotation = Annotation::new(anchor);
        self.message = format!("Annotated {}", annotation.anchor.selector);
        self.annotations.push(annotation);
        io::save_annotations(&self.annotations_path, &self.annotations)?;
        self.reattach();
        Ok(())
    }

    /// Re-read the document from disk and reattach every annotation.
    pub fn reload(&mut self) -> Result<()> {
        self.tree = io::read_document(&self.document_path)?;
        self.rebuild_blocks();
        let delta = self.reattach();
        self.message = format!(
            "Reloaded: {} newly attached, {} newly orphaned",
            delta.newly_attached.len(),
            delta.newly_orphaned.len()
        );
        Ok(())
    }

    /// Drop every annotation that the last pass could not place.
    pub fn delete_orphaned(&mut self) -> Result<()> {
        let before = self.annotations.len();
        let statuses = std::mem::take(&mut self.statuses);
        let mut statuses = statuses.into_iter();
        self.annotations
            .retain(|_| statuses.next() != Some(AnnotationStatus::Orphaned));
        let removed = before - self.annotations.len();

        io::save_annotations(&self.annotations_path, &self.annotations)?;
        self.reattach();
        self.message = format!("Deleted {removed} orphaned annotations");
        Ok(())
    }

    pub fn preview(&self, annotation: &Annotation) -> String {
        truncate_chars(&annotation.anchor.text_snapshot, PREVIEW_CHARS)
    }

    fn rebuild_blocks(&mut self) {
        let tree = &self.tree;
        self.blocks = tree
            .descendants(tree.root())
            .filter(|&node| BLOCK_TAGS.contains(&tree.tag_name(node)))
            .map(|node| {
                let depth = ancestors(tree, node)
                    .filter(|&ancestor| BLOCK_TAGS.contains(&tree.tag_name(ancestor)))
                    .count();
                let text = tree.normalized_text(node);
                let label = format!(
                    "{}{:<4} {}",
                    "  ".repeat(depth),
                    tree.tag_name(node),
                    truncate_chars(&text, PREVIEW_CHARS)
                );
                Block { node, label }
            })
            .collect();

        let selected = self.block_list_state.selected();
        self.block_list_state.select(match (selected, self.blocks.len()) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        });
    }

    fn reattach(&mut self) -> LedgerDelta {
        let reattacher = self.config.reattacher(&self.tree);
        let batch = reattach_annotations(&reattacher, &self.annotations);
        let delta = self.ledger.reconcile(&batch);

        let blocks = &self.blocks;
        self.statuses = batch
            .outcomes
            .iter()
            .map(|(_, result)| match result {
                Some(result) => AnnotationStatus::Attached {
                    method: result.method,
                    score: result.score,
                    block: blocks.iter().position(|block| block.node == result.node),
                },
                None => AnnotationStatus::Orphaned,
            })
            .collect();
        log::debug!(
            "{} newly attached, {} newly orphaned",
            delta.newly_attached.len(),
            delta.newly_orphaned.len()
        );
        delta
    }
}

fn ancestors<T: DocumentTree>(tree: &T, node: T::Node) -> impl Iterator<Item = T::Node> + '_ {
    std::iter::successors(tree.parent(node), |&current| tree.parent(current))
}
