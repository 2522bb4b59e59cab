fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use main proto directory (../../proto relative to client/rust)
    // This ensures client uses the same protos as the server
    let proto_root = "../../proto";

    // Rerun if proto files change
    println!("cargo:rerun-if-changed={}", proto_root);

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&[format!("{}/eupalinos/queue.proto", proto_root)], &[proto_root])?;

    Ok(())
}
