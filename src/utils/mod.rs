pub mod area_classifier;
pub mod db_utils;
pub mod media;
pub mod mobile_filter;
pub mod name_match;
pub mod roster_cache;
