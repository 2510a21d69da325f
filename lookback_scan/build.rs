fn main() {
    #[cfg(feature = "cuda")]
    {
        use cuda_builder::CudaBuilder;

        println!("cargo:rerun-if-changed=../lookback_scan_gpu/src");
        CudaBuilder::new("../lookback_scan_gpu")
            .copy_to("../resources/lookback_scan_gpu.ptx")
            .build()
            .unwrap();
    }
}
