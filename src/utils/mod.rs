pub mod evidence;
pub mod token;
pub mod username_index;
