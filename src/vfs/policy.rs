use bitflags::bitflags;

bitflags! {
    /// What to do when a move or rename lands on an existing entry.
    ///
    /// The empty set is `PROMPT`: every collision raises and the caller decides.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Overwrite: u8 {
        /// Report "not performed" instead of raising.
        const IGNORE = 1 << 0;
        /// Delete the colliding target (file or whole subtree) first.
        const REPLACE = 1 << 1;
        /// Directory onto directory: move the contents across instead of deleting.
        const MERGE = 1 << 2;
    }
}

impl Overwrite {
    pub const PROMPT: Overwrite = Overwrite::empty();

    pub fn is_prompt(self) -> bool {
        self.is_empty()
    }

    pub fn ignores(self) -> bool {
        self.contains(Overwrite::IGNORE)
    }

    pub fn replaces(self) -> bool {
        self.contains(Overwrite::REPLACE)
    }

    pub fn merges(self) -> bool {
        self.contains(Overwrite::MERGE)
    }
}

impl Default for Overwrite {
    fn default() -> Self {
        Overwrite::PROMPT
    }
}

bitflags! {
    /// Ordering policy for listings and bound paths.
    ///
    /// Without `DESCENDING` the order is ascending.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SortFlags: u8 {
        const DESCENDING = 1 << 0;
        const NAME = 1 << 1;
        const INODE = 1 << 2;
        const DIRS_FIRST = 1 << 3;
        const FILES_FIRST = 1 << 4;
        const CASE_SENSITIVE = 1 << 5;
    }
}

impl SortFlags {
    pub const ASCENDING: SortFlags = SortFlags::empty();
}

impl Default for SortFlags {
    /// Name-ordered, ascending, directories before files.
    fn default() -> Self {
        SortFlags::NAME | SortFlags::DIRS_FIRST
    }
}
