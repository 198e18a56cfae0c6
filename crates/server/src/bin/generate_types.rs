//! Prints the TypeScript declarations for every type the HTTP API exchanges.

use ts_rs::TS;

fn main() {
    let decls = [
        db::ordering::Scope::decl(),
        db::ordering::OrderedRow::decl(),
        db::models::pipeline::Pipeline::decl(),
        db::models::pipeline::PipelineWithStages::decl(),
        db::models::pipeline::InitialStage::decl(),
        db::models::pipeline::CreatePipeline::decl(),
        db::models::pipeline::UpdatePipeline::decl(),
        db::models::stage::Stage::decl(),
        db::models::stage::CreateStage::decl(),
        db::models::stage::UpdateStage::decl(),
        db::models::lost_reason::LostReason::decl(),
        db::models::lost_reason::CreateLostReason::decl(),
        db::models::lost_reason::UpdateLostReason::decl(),
        db::models::pipeline_lost_reason::PipelineLostReason::decl(),
        db::models::pipeline_lost_reason::SetPipelineLostReasons::decl(),
        db::models::form_section::EntityType::decl(),
        db::models::form_section::FormSection::decl(),
        db::models::form_section::FormSectionWithFields::decl(),
        db::models::form_section::CreateFormSection::decl(),
        db::models::form_section::UpdateFormSection::decl(),
        db::models::custom_field::FieldType::decl(),
        db::models::custom_field::CustomField::decl(),
        db::models::custom_field::CreateCustomField::decl(),
        db::models::custom_field::UpdateCustomField::decl(),
        db::models::custom_field::MoveCustomField::decl(),
        server::routes::pipelines::ReorderPipeline::decl(),
        server::routes::stages::ReorderStage::decl(),
        server::routes::lost_reasons::ReorderLostReason::decl(),
        server::routes::lost_reasons::ReorderPipelineLostReasons::decl(),
        server::routes::form_sections::ReorderFormSection::decl(),
        server::routes::form_sections::ReorderCustomField::decl(),
        utils::response::ApiResponse::<()>::decl(),
    ];

    println!("// This file was generated by `generate_types`. Do not edit.\n");
    for decl in decls {
        println!("export {decl}\n");
    }
}
