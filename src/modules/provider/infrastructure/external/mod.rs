pub mod google;

pub use google::GoogleTranslateProvider;
