pub mod branch;
pub mod chapter;
pub mod character;
pub mod event;
pub mod fragment;
pub mod quest;
