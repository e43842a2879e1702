//! Integration tests for protosol-build.

use std::fs;

use protosol_build::descriptor::{
    decode_code_generator_request, encode_code_generator_response, CodeGeneratorRequest,
    CodeGeneratorResponse, DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto,
    FieldDescriptorProto, FieldOptions, FileDescriptorProto, FileDescriptorSet, Label,
    MessageOptions, ResponseFile, Type,
};
use protosol_build::{generate, CompileMode, Config, Error, GenerateMode};
use tempfile::tempdir;

fn scalar(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn reference(name: &str, number: i32, ty: Type, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..scalar(name, number, ty)
    }
}

fn repeated(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(Label::Repeated as i32),
        ..field
    }
}

fn packed(field: FieldDescriptorProto) -> FieldDescriptorProto {
    FieldDescriptorProto {
        options: Some(FieldOptions { packed: Some(true) }),
        ..repeated(field)
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn enumeration(name: &str, values: &[(&str, i32)]) -> EnumDescriptorProto {
    EnumDescriptorProto {
        name: Some(name.to_string()),
        value: values
            .iter()
            .map(|(name, number)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(*number),
            })
            .collect(),
    }
}

fn file(name: &str, package: &str) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        package: Some(package.to_string()),
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn request(files: Vec<FileDescriptorProto>, targets: &[&str]) -> CodeGeneratorRequest {
    CodeGeneratorRequest {
        file_to_generate: targets.iter().map(|t| t.to_string()).collect(),
        parameter: None,
        proto_file: files,
    }
}

/// `shop/order.proto`, importing `common/money.proto`.
fn shop() -> Vec<FileDescriptorProto> {
    let money = FileDescriptorProto {
        message_type: vec![message(
            "Money",
            vec![scalar("units", 1, Type::Int64), scalar("currency", 2, Type::String)],
        )],
        ..file("common/money.proto", "common")
    };

    let line = DescriptorProto {
        nested_type: vec![DescriptorProto {
            options: Some(MessageOptions {
                map_entry: Some(true),
            }),
            ..message(
                "AttrsEntry",
                vec![scalar("key", 1, Type::String), scalar("value", 2, Type::String)],
            )
        }],
        enum_type: vec![enumeration("Kind", &[("GOODS", 0), ("SERVICE", 1)])],
        ..message(
            "Line",
            vec![
                scalar("sku", 1, Type::String),
                reference("kind", 2, Type::Enum, ".shop.Line.Kind"),
                repeated(reference("attrs", 3, Type::Message, ".shop.Line.AttrsEntry")),
            ],
        )
    };

    let order = FileDescriptorProto {
        dependency: vec!["common/money.proto".to_string()],
        message_type: vec![
            line,
            message(
                "Order",
                vec![
                    scalar("id", 1, Type::Uint64),
                    reference("total", 2, Type::Message, ".common.Money"),
                    repeated(reference("lines", 3, Type::Message, ".shop.Line")),
                    packed(scalar("weights", 4, Type::Fixed32)),
                    scalar("paid", 5, Type::Bool),
                    scalar("memo", 6, Type::Bytes),
                ],
            ),
        ],
        ..file("shop/order.proto", "shop")
    };

    vec![money, order]
}

fn generate_one(config: &Config, request: &CodeGeneratorRequest) -> String {
    let mut files = generate(config, request).expect("generation failed");
    assert_eq!(files.len(), 1);
    files.remove(0).content
}

#[test]
fn test_generate_shop() {
    let files = generate(&Config::new(), &request(shop(), &["shop/order.proto"]))
        .expect("generation failed");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "shop/order.sol");
    let content = &files[0].content;

    // Header
    assert!(content.starts_with("// File automatically generated by protoc-gen-sol "));
    assert!(content.contains("// SPDX-License-Identifier: CC0\n"));
    assert!(content.contains("pragma solidity >=0.6.0 <8.0.0;\npragma experimental ABIEncoderV2;\n"));

    // Imports: runtime library first, then dependencies relative to this file.
    let runtime = content
        .find("import \"@lazyledger/protobuf3-solidity-lib/contracts/ProtobufLib.sol\";")
        .expect("runtime import");
    let money = content.find("import \"../common/money.sol\";").expect("dependency import");
    assert!(runtime < money);

    // Nested declarations are flattened with the parent's name.
    assert!(content.contains("library Shop {"));
    assert!(content.contains("    enum Line_Kind {\n        GOODS,\n        SERVICE\n    }"));
    assert!(content.contains("    struct Line {"));
    assert!(content.contains("        Line_Kind kind;"));
    assert!(content.contains("        AttrsEntry[] attrs;"));
    assert!(content.contains("    struct AttrsEntry {\n        string key;\n        string value;\n    }"));
    assert!(!content.contains("struct Line_AttrsEntry"));

    // Cross-package types are qualified with their namespace.
    assert!(content.contains("        Common.Money total;"));
    assert!(content.contains("        uint32[] weights;"));

    // One codec per struct, map entries included.
    for codec in ["Shop_LineCodec", "Shop_OrderCodec", "Shop_AttrsEntryCodec"] {
        assert!(content.contains(&format!("library {} {{", codec)), "missing {codec}");
    }
    assert!(content.contains("Common_MoneyCodec.decode("));
    assert!(content.contains("Common_MoneyCodec.encode("));

    // Contiguous enums are range checked inline; no codec library.
    assert!(!content.contains("Shop_Line_KindCodec"));

    // Every length-delimited record is backpatched by the unit's support library.
    assert!(content.contains("library Shop_Order_Support {"));
    assert!(content.contains("Shop_Order_Support.backpatch_length(len_pos, pos, buf)"));
}

#[test]
fn test_generate_is_deterministic() {
    let config = Config::new();
    let request = request(shop(), &["common/money.proto", "shop/order.proto"]);
    let first = generate(&config, &request).unwrap();
    let second = generate(&config, &request).unwrap();
    assert_eq!(first, second);

    let names: Vec<_> = first.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["common/money.sol", "shop/order.sol"]);
}

#[test]
fn test_gapped_enum() {
    let mut colors = file("paint.proto", "paint");
    colors.enum_type = vec![enumeration("Color", &[("A", 0), ("B", 2)])];
    colors.message_type = vec![message(
        "Can",
        vec![reference("color", 1, Type::Enum, ".paint.Color")],
    )];
    let request = request(vec![colors], &["paint.proto"]);

    let err = generate(&Config::new(), &request).unwrap_err();
    assert!(
        matches!(err, Error::InvalidEnum { ref value, .. } if value == "B"),
        "{err}"
    );

    let content = generate_one(Config::new().strict_enum_validation(false), &request);
    assert!(content.contains("library Paint_ColorCodec {"));
    assert!(content.contains("        if (v == 2) {\n            return (true, Paint.Color.B);\n        }"));
    assert!(content.contains("        if (v == Paint.Color.B) {\n            return 2;\n        }"));
    assert!(content.contains("Paint_ColorCodec.decode("));
}

#[test]
fn test_field_number_gap() {
    let mut f = file("gap.proto", "gap");
    f.message_type = vec![message(
        "M",
        vec![scalar("a", 1, Type::Uint32), scalar("c", 3, Type::Uint32)],
    )];
    let request = request(vec![f], &["gap.proto"]);

    let err = generate(&Config::new(), &request).unwrap_err();
    assert!(matches!(err, Error::InvalidField { ref field, .. } if field == "c"), "{err}");

    let content = generate_one(Config::new().strict_field_numbers(false), &request);
    assert!(content.contains("function decode_3("));
    assert!(content.contains("function encode_3("));
    assert!(!content.contains("function decode_2("));
}

#[test]
fn test_floats_use_fixed_point_helpers() {
    let mut f = file("geo.proto", "geo");
    f.message_type = vec![message(
        "Point",
        vec![scalar("lat", 1, Type::Double), scalar("alt", 2, Type::Float)],
    )];
    let content = generate_one(&Config::new(), &request(vec![f], &["geo.proto"]));

    assert!(content.contains("        int64 lat;"));
    assert!(content.contains("        int32 alt;"));
    assert!(content.contains("library Geo_Geo_Support {"));
    assert!(content.contains("function decode_double_scaled("));
    assert!(content.contains("function encode_float_scaled("));
    assert!(content.contains("Geo_Geo_Support.decode_double_scaled(pos, buf)"));
}

#[test]
fn test_generate_modes() {
    let mut f = file("geo.proto", "geo");
    f.message_type = vec![message("Point", vec![scalar("x", 1, Type::Sint64)])];
    let request = request(vec![f], &["geo.proto"]);

    let decoder = generate_one(Config::new().generate_mode(GenerateMode::Decoder), &request);
    assert!(decoder.contains("function decode("));
    assert!(!decoder.contains("function encode("));
    // Nothing in a decoder-only unit needs the support library.
    assert!(!decoder.contains("_Support"));

    let encoder = generate_one(Config::new().generate_mode(GenerateMode::Encoder), &request);
    assert!(encoder.contains("function encode("));
    assert!(!encoder.contains("function decode("));
}

#[test]
fn test_link_mode_is_unimplemented() {
    let err = generate(
        Config::new().compile_mode(CompileMode::Link),
        &request(shop(), &["shop/order.proto"]),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Unimplemented(_)), "{err}");
}

#[test]
fn test_missing_file_to_generate() {
    let err = generate(&Config::new(), &request(shop(), &["nope.proto"])).unwrap_err();
    assert!(matches!(err, Error::MissingFile(ref name) if name == "nope.proto"), "{err}");
}

#[test]
fn test_google_files_are_skipped() {
    let mut files = shop();
    files.push(file("google/protobuf/timestamp.proto", "google.protobuf"));
    let out = generate(
        &Config::new(),
        &request(files, &["google/protobuf/timestamp.proto", "common/money.proto"]),
    )
    .unwrap();
    let names: Vec<_> = out.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["common/money.sol"]);
}

#[test]
fn test_plugin_parameter() {
    let config = Config::from_parameter("license=MIT, generate=encoder").unwrap();
    let content = generate_one(&config, &request(shop(), &["common/money.proto"]));
    assert!(content.contains("// SPDX-License-Identifier: MIT\n"));
    assert!(!content.contains("function decode("));

    let err = Config::from_parameter("generate=everything").unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { ref key, .. } if key == "generate"), "{err}");
}

fn len_delimited(tag: u32, payload: &[u8], buf: &mut Vec<u8>) {
    protosol::wire::encode_len_delimited(tag, payload, buf);
}

fn varint(tag: u32, value: u64, buf: &mut Vec<u8>) {
    protosol::wire::encode_varint_field(tag, value, buf);
}

#[test]
fn test_decode_request() {
    let mut field = Vec::new();
    len_delimited(1, b"id", &mut field);
    varint(3, 1, &mut field);
    varint(4, Label::Optional as u64, &mut field);
    varint(5, Type::Uint64 as u64, &mut field);

    let mut msg = Vec::new();
    len_delimited(1, b"Ping", &mut msg);
    len_delimited(2, &field, &mut msg);

    let mut proto = Vec::new();
    len_delimited(1, b"ping.proto", &mut proto);
    len_delimited(2, b"net", &mut proto);
    len_delimited(4, &msg, &mut proto);
    len_delimited(12, b"proto3", &mut proto);

    let mut bytes = Vec::new();
    len_delimited(1, b"ping.proto", &mut bytes);
    len_delimited(2, b"license=MIT", &mut bytes);
    len_delimited(15, &proto, &mut bytes);

    let request = decode_code_generator_request(&bytes).unwrap();
    assert_eq!(request.file_to_generate, vec!["ping.proto"]);
    assert_eq!(request.parameter.as_deref(), Some("license=MIT"));

    let config = Config::from_parameter(request.parameter.as_deref().unwrap()).unwrap();
    let content = generate_one(&config, &request);
    assert!(content.contains("    struct Ping {\n        uint64 id;\n    }"));
}

#[test]
fn test_encode_response() {
    let response = CodeGeneratorResponse {
        error: None,
        supported_features: Some(1),
        file: vec![ResponseFile {
            name: Some("a.sol".to_string()),
            content: Some("x".to_string()),
        }],
    };
    let mut expected = Vec::new();
    varint(2, 1, &mut expected);
    let mut file = Vec::new();
    len_delimited(1, b"a.sol", &mut file);
    len_delimited(15, b"x", &mut file);
    len_delimited(15, &file, &mut expected);
    assert_eq!(encode_code_generator_response(&response), expected);

    let failed = CodeGeneratorResponse {
        error: Some("bad".to_string()),
        supported_features: None,
        file: Vec::new(),
    };
    assert_eq!(encode_code_generator_response(&failed), b"\x0a\x03bad");
}

#[test]
fn test_compile_fds_writes_files() {
    let out_dir = tempdir().expect("Failed to create temp dir");

    Config::new()
        .out_dir(out_dir.path())
        .license("Apache-2.0")
        .compile_fds(FileDescriptorSet { file: shop() })
        .expect("Failed to compile descriptors");

    let order = out_dir.path().join("shop/order.sol");
    assert!(order.exists(), "shop/order.sol should be generated");
    let money = out_dir.path().join("common/money.sol");
    assert!(money.exists(), "common/money.sol should be generated");

    let content = fs::read_to_string(&order).expect("Failed to read order.sol");
    assert!(content.contains("// SPDX-License-Identifier: Apache-2.0"));
    assert!(content.contains("struct Order {"));
}

#[test]
fn test_compile_protos_with_protoc() {
    // protoc is optional on test machines.
    if which::which("protoc").is_err() && std::env::var_os("PROTOC").is_none() {
        return;
    }
    let out_dir = tempdir().expect("Failed to create temp dir");
    Config::new()
        .out_dir(out_dir.path())
        .compile_protos(&["tests/proto/bank.proto"], &["tests/proto/"])
        .expect("Failed to compile protos");

    let content = fs::read_to_string(out_dir.path().join("bank/bank.sol"))
        .expect("Failed to read bank.sol");
    assert!(content.contains("library Bank {"));
    assert!(content.contains("library Bank_TransferCodec {"));
}
