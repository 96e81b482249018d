use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ImageMetadata::Table)
                    .if_not_exists()
                    .col(string(ImageMetadata::ImageFilename).primary_key())
                    .col(string(ImageMetadata::Prompt))
                    .col(integer(ImageMetadata::Width))
                    .col(integer(ImageMetadata::Height))
                    // Conditioning image slots and per-slot parameters (at most two)
                    .col(string_null(ImageMetadata::ControlImageFilename1))
                    .col(string_null(ImageMetadata::ControlImageFilename2))
                    .col(double_null(ImageMetadata::ControlnetConditioningScale1))
                    .col(double_null(ImageMetadata::ControlnetConditioningScale2))
                    .col(double_null(ImageMetadata::ControlGuidanceEnd1))
                    .col(double_null(ImageMetadata::ControlGuidanceEnd2))
                    .col(integer(ImageMetadata::NumInferenceSteps))
                    .col(double(ImageMetadata::GuidanceScale))
                    .col(big_integer(ImageMetadata::Seed))
                    .col(
                        timestamp_with_time_zone(ImageMetadata::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_image_metadata_created_at")
                    .table(ImageMetadata::Table)
                    .col(ImageMetadata::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ImageMetadata::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum ImageMetadata {
    Table,
    ImageFilename,
    Prompt,
    Width,
    Height,
    ControlImageFilename1,
    ControlImageFilename2,
    ControlnetConditioningScale1,
    ControlnetConditioningScale2,
    ControlGuidanceEnd1,
    ControlGuidanceEnd2,
    NumInferenceSteps,
    GuidanceScale,
    Seed,
    CreatedAt,
}
