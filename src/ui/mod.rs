pub mod icons;
pub mod view;

pub use view::{render_state, render_step, render_tree};
