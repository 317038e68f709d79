use portugol::{compile, compile_with_dumps, DumpOptions};

fn build(code: &str) -> Result<String, String> {
    compile(code.as_bytes(), "<test>", DumpOptions::empty())
        .map(|assembly| assembly.to_string())
        .map_err(|diagnostics| diagnostics.to_string())
}

#[test]
fn complete_program() {
    let assembly = build(
        "inicio
            inteiro soma(inteiro a, inteiro b) inicio
                escreva(a + b)
            fim

            inteiro x = 20
            flutuante media = 7.5
            cadeia nome = \"Ana\"

            se (x > 15 e media >= 7) faca
                escreva(nome)
            senao
                escreva(\"reprovado\")

            para (inteiro i = 0; i < 3; i++) faca
                soma(i, x)
         fim",
    )
    .unwrap();

    assert!(assembly.starts_with(".data\n"));
    assert!(assembly.contains(".text\n"));
    assert!(assembly.contains(".globl main\n"));
    assert!(assembly.contains("main:\n"));
    assert!(assembly.contains("user_soma:\n"));
    assert!(assembly.contains("var_media:"));
    assert!(assembly.contains(".asciiz \"Ana\""));

    // La rutina se ubica después de la salida del programa
    let exit = assembly.find("li      $v0, 10").unwrap();
    let routine = assembly.find("user_soma:\n").unwrap();
    assert!(exit < routine);
}

#[test]
fn empty_program() {
    let assembly = build("").unwrap();
    assert!(assembly.contains("main:\n"));
    assert!(assembly.contains("syscall"));

    let wrapped = build("inicio fim").unwrap();
    assert_eq!(assembly, wrapped);
}

#[test]
fn lexical_errors_stop_the_build() {
    let report = build("inteiro x = 1\nx = x @ 2\nx = 99999999999").unwrap_err();

    assert!(report.contains("Lexical error: Bad character '@' in input stream"));
    assert!(report.contains("Lexical error: Integer literal overflow"));
    assert!(report.contains("<test>:2:"));
    assert!(report.ends_with("Build failed with 2 errors\n"));
}

#[test]
fn syntax_errors_are_reported_together() {
    let report = build("inteiro = 5\nescreva(1)\nse x > faca\nescreva(2)").unwrap_err();

    assert!(report.contains("Syntax error: Expected identifier"));
    assert!(report.matches("Syntax error:").count() >= 2);
    assert!(!report.contains("Semantic error"));
}

#[test]
fn semantic_errors_are_reported_with_context() {
    let report = build("inteiro x = 1\nx = y + 2").unwrap_err();

    assert!(report.contains("Semantic error: Variable `y` is not declared"));
    assert!(report.contains(" --> <test>:2:5"));
    assert!(report.contains("2 | x = y + 2"));
    assert!(report.ends_with("Build failed with 1 error\n"));
}

#[test]
fn type_errors() {
    let report = build("inteiro x = \"texto\"\nenquanto (x) faca x = x - 1").unwrap_err();

    assert!(report.contains("Type mismatch: expected `inteiro`, found `cadeia`"));
    assert!(report.contains("Condition must be `logico`, found `inteiro`"));
    assert!(report.ends_with("Build failed with 2 errors\n"));
}

#[test]
fn diagnostics_are_exposed() {
    let diagnostics = compile(
        "escreva(a)\nescreva(b)".as_bytes(),
        "<test>",
        DumpOptions::empty(),
    )
    .unwrap_err();

    assert_eq!(diagnostics.len(), 2);

    let lines: Vec<_> = diagnostics.iter().map(|error| error.line()).collect();
    assert_eq!(lines, [1, 2]);
}

#[test]
fn dumps_stay_out_of_the_assembly() {
    let mut dumped = Vec::new();
    let assembly = compile_with_dumps(
        "inteiro x = 1 escreva(x)".as_bytes(),
        "<test>",
        DumpOptions::TOKENS | DumpOptions::AST,
        &mut dumped,
    )
    .unwrap()
    .to_string();

    let dumped = String::from_utf8(dumped).unwrap();
    assert!(dumped.starts_with("Tokens: ["));
    assert!(dumped.contains("Ast: Ast {"));
    assert!(dumped.contains("Declaration("));

    assert!(!assembly.contains("Tokens:"));
    assert!(!assembly.contains("Ast:"));
    assert!(assembly.starts_with(".data\n"));
}
