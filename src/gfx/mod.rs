pub mod anim;
pub mod camera;
pub mod draw;
pub mod math;
pub mod scene;
