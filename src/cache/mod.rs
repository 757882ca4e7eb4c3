/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: 프로세스 내 TTL + LRU 캐시
**/
pub mod manager;
pub mod size;

pub use manager::*;
pub use size::*;
