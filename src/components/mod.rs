pub mod composer;
pub mod sidebar;
pub mod status_bar;
pub mod terminal;
