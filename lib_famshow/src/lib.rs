pub mod ascii_tree;
pub mod error;
pub mod logo;
pub mod newick;
