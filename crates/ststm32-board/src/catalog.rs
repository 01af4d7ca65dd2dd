//! Board lookup by id.

use std::collections::BTreeMap;
use std::path::Path;

use crate::builtin;
use crate::descriptor::BoardDescriptor;
use crate::error::{BoardError, Result};
use crate::parse::{discover_boards, load_board_toml};

/// Deprecated board ids and the canonical id they resolve to.
pub const LEGACY_BOARD_ALIASES: &[(&str, &str)] = &[
    ("bluepill", "bluepill_f103c8"),
    ("genericSTM32F103C8", "bluepill_f103c8"),
    ("stm32f4discovery", "disco_f407vg"),
    ("disco_l475vg_iot", "disco_l475vg_iot01a"),
];

/// Map a possibly deprecated board id to its canonical id.
pub fn canonical_board_id(id: &str) -> &str {
    LEGACY_BOARD_ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == id)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(id)
}

/// All boards known to a build: built-ins plus manifests from disk.
#[derive(Debug, Clone)]
pub struct BoardCatalog {
    boards: BTreeMap<String, BoardDescriptor>,
}

impl BoardCatalog {
    /// A catalog holding only the built-in boards.
    pub fn builtin() -> Self {
        let boards = builtin::all()
            .into_iter()
            .map(|b| (b.id.clone(), b))
            .collect();
        Self { boards }
    }

    /// Built-in boards plus every manifest in `boards_dir`.
    ///
    /// A manifest whose id matches a built-in board replaces it.
    pub fn with_dir(boards_dir: &Path) -> Result<Self> {
        let mut catalog = Self::builtin();
        for (file_id, path) in discover_boards(boards_dir)? {
            let board = load_board_toml(&path)?;
            if board.id != file_id {
                return Err(BoardError::Validation {
                    detail: format!(
                        "{} declares id '{}' but is named after '{}'",
                        path.display(),
                        board.id,
                        file_id
                    ),
                });
            }
            if catalog.boards.contains_key(&board.id) {
                log::debug!("{} shadows the built-in board '{}'", path.display(), board.id);
            }
            catalog.boards.insert(board.id.clone(), board);
        }
        Ok(catalog)
    }

    /// Look up a board, applying the legacy alias table first.
    pub fn get(&self, id: &str) -> Result<&BoardDescriptor> {
        let canonical = canonical_board_id(id);
        if canonical != id {
            log::info!("board '{id}' is deprecated, using '{canonical}'");
        }
        self.boards.get(canonical).ok_or_else(|| BoardError::UnknownBoard {
            id: canonical.to_string(),
        })
    }

    /// Iterate boards sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = &BoardDescriptor> {
        self.boards.values()
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }
}

impl Default for BoardCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
