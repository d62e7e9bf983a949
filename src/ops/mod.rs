pub mod adjustments;
pub mod canvas_ops;
pub mod filters;
pub mod shapes;
