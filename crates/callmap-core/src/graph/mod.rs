pub mod code_graph;
pub mod symbol_table;
