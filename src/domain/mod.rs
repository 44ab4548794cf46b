// Domain layer - Visual console model and click links
pub mod console;
pub mod link;
