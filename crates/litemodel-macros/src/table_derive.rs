//! Implementation of the Table derive macro.
//!
//! Parses `#[litemodel(...)]` attributes into a [`TableDef`], checks it, and generates the
//! `Table` implementation plus one typed `Field` constant per column.

use std::sync::LazyLock;

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use regex::Regex;
use syn::{Data, DeriveInput, Error, Fields, Ident, LitStr, Path, Result, Type};

static IDENTIFIER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

fn is_identifier(name: &str) -> bool {
    IDENTIFIER.as_ref().is_some_and(|re| re.is_match(name))
}

/// Parsed definition of a struct with `#[derive(Table)]`.
#[derive(Debug)]
pub struct TableDef {
    pub name: Ident,
    pub table_name: String,
    pub fields: Vec<FieldDef>,
}

/// One struct field.
#[derive(Debug)]
pub struct FieldDef {
    pub ident: Ident,
    pub ty: Type,
    pub column: String,
    /// Not a column; filled with `Default::default()` on load
    pub skip: bool,
    pub constraints: Vec<ConstraintDef>,
}

impl FieldDef {
    fn is_primary_key(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, ConstraintDef::PrimaryKey { .. }))
    }
}

/// One column constraint, in declaration order. Names are already resolved to enum variants.
#[derive(Debug)]
pub enum ConstraintDef {
    NotNull(Option<Ident>),
    Unique(Option<Ident>),
    PrimaryKey {
        autoincrement: bool,
        on_conflict: Option<Ident>,
    },
    Default(String),
    Collate(Ident),
    Check(String),
    References {
        target: Path,
        on_update: Option<Ident>,
        on_delete: Option<Ident>,
    },
}

/// Parse a `DeriveInput` into a `TableDef`.
pub fn parse_table(input: &DeriveInput) -> Result<TableDef> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Table cannot be derived for generic structs",
        ));
    }

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named,
            other => {
                return Err(Error::new_spanned(
                    other,
                    "Table requires a struct with named fields",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Table can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Table can only be derived for structs, not unions",
            ));
        }
    };

    let name = input.ident.clone();
    let mut table_name = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("litemodel") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                check_identifier(&lit)?;
                table_name = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unknown table attribute; expected `table = \"...\"`"))
            }
        })?;
    }
    let table_name = table_name.unwrap_or_else(|| default_table_name(&name.to_string()));

    let fields = named
        .named
        .iter()
        .map(|f| parse_field(f, &name))
        .collect::<Result<Vec<_>>>()?;

    let def = TableDef {
        name,
        table_name,
        fields,
    };
    check_table(&def)?;
    Ok(def)
}

fn parse_field(field: &syn::Field, owner: &Ident) -> Result<FieldDef> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;

    let mut column = None;
    let mut skip = false;
    let mut autoincrement = None;
    let mut constraints = Vec::new();

    for attr in &field.attrs {
        if !attr.path().is_ident("litemodel") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let path = &meta.path;
            if path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                check_identifier(&lit)?;
                column = Some(lit.value());
            } else if path.is_ident("skip") {
                skip = true;
            } else if path.is_ident("autoincrement") {
                autoincrement = Some(path.clone());
            } else if path.is_ident("primary_key") {
                let on_conflict = parse_on_conflict(&meta)?;
                constraints.push(ConstraintDef::PrimaryKey {
                    autoincrement: false,
                    on_conflict,
                });
            } else if path.is_ident("not_null") {
                constraints.push(ConstraintDef::NotNull(parse_on_conflict(&meta)?));
            } else if path.is_ident("unique") {
                constraints.push(ConstraintDef::Unique(parse_on_conflict(&meta)?));
            } else if path.is_ident("default") {
                let lit: LitStr = meta.value()?.parse()?;
                constraints.push(ConstraintDef::Default(lit.value()));
            } else if path.is_ident("check") {
                let lit: LitStr = meta.value()?.parse()?;
                constraints.push(ConstraintDef::Check(lit.value()));
            } else if path.is_ident("collate") {
                let lit: LitStr = meta.value()?.parse()?;
                let variant = match lit.value().to_lowercase().as_str() {
                    "binary" => "Binary",
                    "nocase" => "NoCase",
                    "rtrim" => "RTrim",
                    _ => {
                        return Err(Error::new_spanned(
                            &lit,
                            "unknown collation; expected binary, nocase or rtrim",
                        ));
                    }
                };
                constraints.push(ConstraintDef::Collate(Ident::new(variant, lit.span())));
            } else if path.is_ident("references") {
                constraints.push(parse_references(&meta, owner)?);
            } else {
                return Err(meta.error(
                    "unknown field attribute; expected column, primary_key, autoincrement, \
                     not_null, unique, default, collate, check, references or skip",
                ));
            }
            Ok(())
        })?;
    }

    if let Some(path) = autoincrement {
        let Some(ConstraintDef::PrimaryKey { autoincrement, .. }) = constraints
            .iter_mut()
            .find(|c| matches!(c, ConstraintDef::PrimaryKey { .. }))
        else {
            return Err(Error::new_spanned(path, "autoincrement requires primary_key"));
        };
        *autoincrement = true;
    }

    if skip && !constraints.is_empty() {
        return Err(Error::new_spanned(
            &ident,
            "a skipped field cannot carry column constraints",
        ));
    }

    let column = column.unwrap_or_else(|| unraw(&ident));
    Ok(FieldDef {
        ident,
        ty: field.ty.clone(),
        column,
        skip,
        constraints,
    })
}

/// `primary_key`, `unique` and `not_null` accept an optional `(on_conflict = "...")`.
fn parse_on_conflict(meta: &syn::meta::ParseNestedMeta<'_>) -> Result<Option<Ident>> {
    if !meta.input.peek(syn::token::Paren) {
        return Ok(None);
    }
    let mut clause = None;
    meta.parse_nested_meta(|inner| {
        if !inner.path.is_ident("on_conflict") {
            return Err(inner.error("expected `on_conflict = \"...\"`"));
        }
        let lit: LitStr = inner.value()?.parse()?;
        let variant = match lit.value().to_lowercase().as_str() {
            "rollback" => "Rollback",
            "abort" => "Abort",
            "fail" => "Fail",
            "ignore" => "Ignore",
            "replace" => "Replace",
            _ => {
                return Err(Error::new_spanned(
                    &lit,
                    "unknown conflict clause; expected rollback, abort, fail, ignore or replace",
                ));
            }
        };
        clause = Some(Ident::new(variant, lit.span()));
        Ok(())
    })?;
    Ok(clause)
}

/// `references(Other::FIELD, on_update = "...", on_delete = "...")`
fn parse_references(meta: &syn::meta::ParseNestedMeta<'_>, owner: &Ident) -> Result<ConstraintDef> {
    let content;
    syn::parenthesized!(content in meta.input);
    let mut target: Path = content.parse()?;
    if target.segments.len() < 2 {
        return Err(Error::new_spanned(
            &target,
            "expected a field constant such as `Student::ID`",
        ));
    }
    if target.segments[0].ident == "Self" {
        target.segments[0].ident = owner.clone();
    }

    let mut on_update = None;
    let mut on_delete = None;
    while !content.is_empty() {
        content.parse::<syn::Token![,]>()?;
        if content.is_empty() {
            break;
        }
        let key: Ident = content.parse()?;
        content.parse::<syn::Token![=]>()?;
        let lit: LitStr = content.parse()?;
        let action = parse_action(&lit)?;
        if key == "on_update" {
            on_update = Some(action);
        } else if key == "on_delete" {
            on_delete = Some(action);
        } else {
            return Err(Error::new_spanned(key, "expected on_update or on_delete"));
        }
    }

    Ok(ConstraintDef::References {
        target,
        on_update,
        on_delete,
    })
}

fn parse_action(lit: &LitStr) -> Result<Ident> {
    let variant = match lit.value().to_lowercase().replace('_', " ").as_str() {
        "no action" => "NoAction",
        "restrict" => "Restrict",
        "set null" => "SetNull",
        "set default" => "SetDefault",
        "cascade" => "Cascade",
        _ => {
            return Err(Error::new_spanned(
                lit,
                "unknown referential action; expected no_action, restrict, set_null, \
                 set_default or cascade",
            ));
        }
    };
    Ok(Ident::new(variant, lit.span()))
}

fn check_identifier(lit: &LitStr) -> Result<()> {
    if is_identifier(&lit.value()) {
        Ok(())
    } else {
        Err(Error::new_spanned(
            lit,
            format!("`{}` is not a valid SQL identifier", lit.value()),
        ))
    }
}

/// Table-wide rules: one primary key, unique column names, one foreign key per referenced
/// table on each column.
fn check_table(def: &TableDef) -> Result<()> {
    let mut primary = None;
    let mut columns: Vec<&str> = Vec::new();

    for field in def.fields.iter().filter(|f| !f.skip) {
        if !is_identifier(&field.column) {
            return Err(Error::new_spanned(
                &field.ident,
                format!("`{}` is not a valid SQL identifier", field.column),
            ));
        }
        if columns.contains(&field.column.as_str()) {
            return Err(Error::new_spanned(
                &field.ident,
                format!("duplicate column `{}`", field.column),
            ));
        }
        columns.push(&field.column);

        if field.is_primary_key() {
            if let Some(first) = primary.replace(&field.ident) {
                return Err(Error::new_spanned(
                    &field.ident,
                    format!("a table has at most one primary key; `{first}` is already one"),
                ));
            }
        }

        let mut referenced: Vec<String> = Vec::new();
        for constraint in &field.constraints {
            if let ConstraintDef::References { target, .. } = constraint {
                let table = owning_type(target);
                if referenced.contains(&table) {
                    return Err(Error::new_spanned(
                        target,
                        format!("duplicate foreign key to `{table}` on one column"),
                    ));
                }
                referenced.push(table);
            }
        }
    }

    if columns.is_empty() {
        return Err(Error::new(
            def.name.span(),
            "Table requires at least one column",
        ));
    }
    Ok(())
}

/// `a::b::Student::ID` -> `Student`
///
/// Only the type segment is compared, so `Student::ID` and `crate::Student::NAME` name the
/// same table.
fn owning_type(target: &Path) -> String {
    let len = target.segments.len();
    target.segments[len - 2].ident.to_string()
}

fn unraw(ident: &Ident) -> String {
    let s = ident.to_string();
    s.strip_prefix("r#").map_or_else(|| s.clone(), str::to_string)
}

/// `Student` -> `students`, `Category` -> `categories`, `CourseClass` -> `course_classes`.
pub fn default_table_name(struct_name: &str) -> String {
    let mut snake = String::with_capacity(struct_name.len() + 4);
    for (i, c) in struct_name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                snake.push('_');
            }
            snake.extend(c.to_lowercase());
        } else {
            snake.push(c);
        }
    }

    if let Some(stem) = snake.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    if snake.ends_with('s') || snake.ends_with('x') || snake.ends_with("ch") || snake.ends_with("sh")
    {
        snake.push_str("es");
    } else {
        snake.push('s');
    }
    snake
}

/// Generate the `Table` implementation and field constants.
pub fn generate_table_impl(def: &TableDef) -> TokenStream {
    let name = &def.name;
    let table_name = &def.table_name;
    let columns: Vec<&FieldDef> = def.fields.iter().filter(|f| !f.skip).collect();

    let field_consts = columns.iter().enumerate().map(|(index, field)| {
        let const_name = format_ident!("{}", unraw(&field.ident).to_uppercase(), span = field.ident.span());
        let ty = &field.ty;
        let column = &field.column;
        let doc = format!("Column `{table_name}`.`{column}`");
        quote! {
            #[doc = #doc]
            pub const #const_name: litemodel_core::Field<#name, #ty> =
                litemodel_core::Field::new(<#name as litemodel_core::Table>::TABLE_NAME, #column, #index);
        }
    });

    let column_infos = columns.iter().map(|field| {
        let ty = &field.ty;
        let column = &field.column;
        let constraints = field.constraints.iter().map(constraint_tokens);
        quote! {
            litemodel_core::ColumnInfo {
                name: #column,
                sql_type: <#ty as litemodel_core::FieldType>::SQL_TYPE,
                nullable: <#ty as litemodel_core::FieldType>::NULLABLE,
                constraints: &[#(#constraints),*],
            }
        }
    });

    let to_values = columns.iter().map(|field| {
        let ident = &field.ident;
        quote! { litemodel_core::FieldType::to_value(&self.#ident) }
    });

    let mut index = 0_usize;
    let loads = def.fields.iter().map(|field| {
        let ident = &field.ident;
        if field.skip {
            quote! { #ident: ::core::default::Default::default() }
        } else {
            let ty = &field.ty;
            let at = index;
            index += 1;
            quote! { #ident: row.get_as::<#ty>(offset + #at)? }
        }
    });
    let loads: Vec<TokenStream> = loads.collect();

    let primary = columns.iter().find(|f| f.is_primary_key());
    let (primary_key_value, set_row_id) = match primary {
        Some(field) => {
            let ident = &field.ident;
            let ty = &field.ty;
            (
                quote! { ::core::option::Option::Some(litemodel_core::FieldType::to_value(&self.#ident)) },
                quote! {
                    fn set_row_id(&mut self, id: i64) {
                        if let ::core::result::Result::Ok(value) =
                            <#ty as litemodel_core::FieldType>::from_value(&litemodel_core::Value::BigInt(id))
                        {
                            self.#ident = value;
                        }
                    }
                },
            )
        }
        None => (quote! { ::core::option::Option::None }, quote! {}),
    };

    quote! {
        impl #name {
            #(#field_consts)*
        }

        impl litemodel_core::Table for #name {
            const TABLE_NAME: &'static str = #table_name;

            fn info() -> &'static litemodel_core::TableInfo {
                static INFO: litemodel_core::TableInfo = litemodel_core::TableInfo {
                    name: #table_name,
                    columns: &[#(#column_infos),*],
                };
                &INFO
            }

            fn to_values(&self) -> ::std::vec::Vec<litemodel_core::Value> {
                ::std::vec![#(#to_values),*]
            }

            fn from_row(row: &litemodel_core::Row, offset: usize) -> litemodel_core::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#loads),*
                })
            }

            fn primary_key_value(&self) -> ::core::option::Option<litemodel_core::Value> {
                #primary_key_value
            }

            #set_row_id
        }
    }
}

fn conflict_tokens(clause: Option<&Ident>) -> TokenStream {
    match clause {
        Some(variant) => quote! { ::core::option::Option::Some(litemodel_core::ConflictClause::#variant) },
        None => quote! { ::core::option::Option::None },
    }
}

fn action_tokens(action: Option<&Ident>) -> TokenStream {
    match action {
        Some(variant) => {
            quote! { ::core::option::Option::Some(litemodel_core::ReferentialAction::#variant) }
        }
        None => quote! { ::core::option::Option::None },
    }
}

fn constraint_tokens(constraint: &ConstraintDef) -> TokenStream {
    match constraint {
        ConstraintDef::NotNull(clause) => {
            let clause = conflict_tokens(clause.as_ref());
            quote! { litemodel_core::Constraint::NotNull { on_conflict: #clause } }
        }
        ConstraintDef::Unique(clause) => {
            let clause = conflict_tokens(clause.as_ref());
            quote! { litemodel_core::Constraint::Unique { on_conflict: #clause } }
        }
        ConstraintDef::PrimaryKey {
            autoincrement,
            on_conflict,
        } => {
            let clause = conflict_tokens(on_conflict.as_ref());
            quote! {
                litemodel_core::Constraint::PrimaryKey {
                    autoincrement: #autoincrement,
                    on_conflict: #clause,
                }
            }
        }
        ConstraintDef::Default(sql) => quote! { litemodel_core::Constraint::Default(#sql) },
        ConstraintDef::Collate(variant) => {
            quote! { litemodel_core::Constraint::Collate(litemodel_core::Collation::#variant) }
        }
        ConstraintDef::Check(sql) => quote! { litemodel_core::Constraint::Check(#sql) },
        ConstraintDef::References {
            target,
            on_update,
            on_delete,
        } => {
            let on_update = action_tokens(on_update.as_ref());
            let on_delete = action_tokens(on_delete.as_ref());
            quote! {
                litemodel_core::Constraint::ForeignKey(litemodel_core::ForeignKey {
                    table: #target.table,
                    column: #target.name,
                    on_update: #on_update,
                    on_delete: #on_delete,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn parse(input: DeriveInput) -> Result<TableDef> {
        parse_table(&input)
    }

    #[test]
    fn test_default_table_names() {
        assert_eq!(default_table_name("Student"), "students");
        assert_eq!(default_table_name("Category"), "categories");
        assert_eq!(default_table_name("Day"), "days");
        assert_eq!(default_table_name("CourseClass"), "course_classes");
        assert_eq!(default_table_name("Box"), "boxes");
    }

    #[test]
    fn test_parse_constraints_in_order() {
        let def = parse(parse_quote! {
            #[litemodel(table = "students")]
            struct Student {
                #[litemodel(autoincrement, primary_key)]
                id: i64,
                #[litemodel(unique(on_conflict = "replace"), collate = "nocase")]
                name: String,
                #[litemodel(column = "class_year", default = "1")]
                year: i32,
                #[litemodel(skip)]
                cache: Vec<String>,
            }
        })
        .unwrap();

        assert_eq!(def.table_name, "students");
        assert_eq!(def.fields.len(), 4);
        assert!(matches!(
            def.fields[0].constraints[0],
            ConstraintDef::PrimaryKey {
                autoincrement: true,
                on_conflict: None
            }
        ));
        match &def.fields[1].constraints[..] {
            [ConstraintDef::Unique(Some(clause)), ConstraintDef::Collate(collation)] => {
                assert_eq!(clause.to_string(), "Replace");
                assert_eq!(collation.to_string(), "NoCase");
            }
            other => panic!("unexpected constraints: {other:?}"),
        }
        assert_eq!(def.fields[2].column, "class_year");
        assert!(def.fields[3].skip);
    }

    #[test]
    fn test_references_with_actions() {
        let def = parse(parse_quote! {
            struct Enrollment {
                #[litemodel(references(Student::ID, on_delete = "cascade", on_update = "set_null"))]
                student_id: i64,
                #[litemodel(references(Self::STUDENT_ID))]
                previous: Option<i64>,
            }
        })
        .unwrap();
        assert_eq!(def.table_name, "enrollments");
        match &def.fields[0].constraints[0] {
            ConstraintDef::References {
                target,
                on_update,
                on_delete,
            } => {
                assert_eq!(owning_type(target), "Student");
                assert_eq!(on_update.as_ref().map(Ident::to_string).as_deref(), Some("SetNull"));
                assert_eq!(on_delete.as_ref().map(Ident::to_string).as_deref(), Some("Cascade"));
            }
            other => panic!("unexpected constraint: {other:?}"),
        }
        match &def.fields[1].constraints[0] {
            ConstraintDef::References { target, .. } => {
                assert_eq!(owning_type(target), "Enrollment");
            }
            other => panic!("unexpected constraint: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_two_primary_keys() {
        let err = parse(parse_quote! {
            struct Pair {
                #[litemodel(primary_key)]
                a: i64,
                #[litemodel(primary_key)]
                b: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("at most one primary key"));
    }

    #[test]
    fn test_rejects_duplicate_foreign_key() {
        let err = parse(parse_quote! {
            struct Enrollment {
                #[litemodel(references(Student::ID), references(Student::NAME))]
                student_id: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("duplicate foreign key to `Student`"));

        let err = parse(parse_quote! {
            struct Enrollment {
                #[litemodel(references(Student::ID), references(crate::school::Student::NAME))]
                student_id: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("duplicate foreign key to `Student`"));
    }

    #[test]
    fn test_rejects_bad_identifiers_and_attributes() {
        let err = parse(parse_quote! {
            #[litemodel(table = "my-table")]
            struct Thing {
                id: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("not a valid SQL identifier"));

        let err = parse(parse_quote! {
            struct Thing {
                #[litemodel(indexed)]
                id: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("unknown field attribute"));

        let err = parse(parse_quote! {
            struct Thing {
                #[litemodel(autoincrement)]
                id: i64,
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("autoincrement requires primary_key"));
    }

    #[test]
    fn test_rejects_generics_and_enums() {
        assert!(parse(parse_quote! { struct Wrapper<T> { value: T } }).is_err());
        assert!(parse(parse_quote! { enum Kind { A, B } }).is_err());
        assert!(parse(parse_quote! { struct Tuple(i64); }).is_err());
    }

    #[test]
    fn test_generated_tokens_mention_fields() {
        let def = parse(parse_quote! {
            struct Student {
                #[litemodel(primary_key, autoincrement)]
                id: i64,
                gpa: f64,
            }
        })
        .unwrap();
        let tokens = generate_table_impl(&def).to_string();
        assert!(tokens.contains("pub const ID"));
        assert!(tokens.contains("pub const GPA"));
        assert!(tokens.contains("fn set_row_id"));
        assert!(tokens.contains("\"students\""));
    }
}
