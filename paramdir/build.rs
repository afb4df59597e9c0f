fn main() {
    // Generate the parameter file messages
    protobuf_codegen::Codegen::new()
        .pure()
        .includes(["src/protos"])
        .input("src/protos/parameter.proto")
        .cargo_out_dir("parameter-protos")
        .run_from_script();
}
