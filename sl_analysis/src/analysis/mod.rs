pub mod lethality;
pub mod pie_chart;
pub mod ridgeline;
pub mod table_display;
