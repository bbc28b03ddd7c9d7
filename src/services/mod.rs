pub mod cesium_api;
pub mod pipeline;
pub mod poller;
pub mod storage;
pub mod uploader;
