//! Allowed values for the tracker's closed vocabularies.

/// Work item states across the Agile, Scrum and CMMI process templates.
pub const ALLOWED_STATES: &[&str] = &[
    "New",
    "Active",
    "Resolved",
    "Closed",
    "Done",
    "Removed",
    "In Progress",
    "Committed",
    "In Review",
    "Completed",
    "Proposed",
    "Approved",
    "Analysis",
    "Design",
    "Development",
    "Testing",
    "Verified",
    "Ready",
    "To Do",
    "In Planning",
    "Cut",
];

/// States counted as finished in sprint summaries.
pub const COMPLETED_STATES: &[&str] = &["Done", "Closed", "Resolved", "Completed"];

/// States counted as in flight in sprint summaries.
pub const IN_PROGRESS_STATES: &[&str] = &["Active", "In Progress", "Committed", "In Review"];

pub const ALLOWED_WORK_ITEM_TYPES: &[&str] = &[
    "User Story",
    "Task",
    "Bug",
    "Feature",
    "Epic",
    "Issue",
    "Product Backlog Item",
    "Impediment",
    "Requirement",
    "Change Request",
    "Review",
    "Risk",
    "Test Case",
    "Code Review Request",
    "Code Review Response",
    "Feedback Request",
    "Feedback Response",
    "Shared Steps",
    "Shared Parameter",
    "Test Plan",
    "Test Suite",
];

/// Field reference names a caller may read, filter or write.
pub const ALLOWED_FIELD_NAMES: &[&str] = &[
    "System.Id",
    "System.Rev",
    "System.AreaPath",
    "System.TeamProject",
    "System.IterationPath",
    "System.WorkItemType",
    "System.State",
    "System.Reason",
    "System.AssignedTo",
    "System.CreatedDate",
    "System.CreatedBy",
    "System.ChangedDate",
    "System.ChangedBy",
    "System.CommentCount",
    "System.Title",
    "System.BoardColumn",
    "System.BoardColumnDone",
    "System.Description",
    "System.Tags",
    "System.History",
    "System.RelatedLinkCount",
    "System.AttachedFileCount",
    "System.HyperLinkCount",
    "System.ExternalLinkCount",
    "System.RemoteLinkCount",
    "System.AuthorizedAs",
    "System.AuthorizedDate",
    "System.RevisedDate",
    "System.Watermark",
    "System.Parent",
    "Microsoft.VSTS.Common.StateChangeDate",
    "Microsoft.VSTS.Common.ActivatedDate",
    "Microsoft.VSTS.Common.ActivatedBy",
    "Microsoft.VSTS.Common.ResolvedDate",
    "Microsoft.VSTS.Common.ResolvedBy",
    "Microsoft.VSTS.Common.ResolvedReason",
    "Microsoft.VSTS.Common.ClosedDate",
    "Microsoft.VSTS.Common.ClosedBy",
    "Microsoft.VSTS.Common.Priority",
    "Microsoft.VSTS.Common.Severity",
    "Microsoft.VSTS.Common.ValueArea",
    "Microsoft.VSTS.Common.Risk",
    "Microsoft.VSTS.Common.StackRank",
    "Microsoft.VSTS.Common.Triage",
    "Microsoft.VSTS.Common.AcceptanceCriteria",
    "Microsoft.VSTS.Common.BacklogPriority",
    "Microsoft.VSTS.Common.BusinessValue",
    "Microsoft.VSTS.Common.TimeCriticality",
    "Microsoft.VSTS.Common.Activity",
    "Microsoft.VSTS.Scheduling.RemainingWork",
    "Microsoft.VSTS.Scheduling.CompletedWork",
    "Microsoft.VSTS.Scheduling.OriginalEstimate",
    "Microsoft.VSTS.Scheduling.StoryPoints",
    "Microsoft.VSTS.Scheduling.Effort",
    "Microsoft.VSTS.Scheduling.Size",
    "Microsoft.VSTS.Scheduling.StartDate",
    "Microsoft.VSTS.Scheduling.FinishDate",
    "Microsoft.VSTS.Scheduling.TargetDate",
    "Microsoft.VSTS.Scheduling.DueDate",
    "Microsoft.VSTS.Build.IntegrationBuild",
    "Microsoft.VSTS.Build.FoundIn",
    "Microsoft.VSTS.CMMI.RequirementType",
    "Microsoft.VSTS.CMMI.Analysis",
    "Microsoft.VSTS.CMMI.TaskType",
    "Microsoft.VSTS.CMMI.Blocked",
    "Microsoft.VSTS.CMMI.Impact",
    "Microsoft.VSTS.CMMI.Probability",
    "Microsoft.VSTS.CMMI.Mitigation",
    "Microsoft.VSTS.CMMI.ContingencyPlan",
    "Microsoft.VSTS.TCM.ReproSteps",
    "Microsoft.VSTS.TCM.SystemInfo",
    "Microsoft.VSTS.TCM.Steps",
    "Microsoft.VSTS.TCM.LocalDataSource",
    "Microsoft.VSTS.TCM.Parameters",
    "Microsoft.VSTS.TCM.AutomatedTestName",
    "Microsoft.VSTS.TCM.AutomatedTestStorage",
    "Microsoft.VSTS.TCM.AutomatedTestId",
    "Microsoft.VSTS.TCM.AutomatedTestType",
];

/// Fields the tracker maintains itself. Readable, never writable.
pub const READ_ONLY_FIELDS: &[&str] = &[
    "System.Id",
    "System.Rev",
    "System.TeamProject",
    "System.CreatedDate",
    "System.CreatedBy",
    "System.ChangedDate",
    "System.ChangedBy",
    "System.CommentCount",
    "System.RelatedLinkCount",
    "System.AttachedFileCount",
    "System.HyperLinkCount",
    "System.ExternalLinkCount",
    "System.RemoteLinkCount",
    "System.AuthorizedAs",
    "System.AuthorizedDate",
    "System.RevisedDate",
    "System.Watermark",
    "System.BoardColumnDone",
];

/// Fields that carry HTML and go through the rich-text sanitiser.
pub const RICH_TEXT_FIELDS: &[&str] = &[
    "System.Description",
    "System.History",
    "Microsoft.VSTS.Common.AcceptanceCriteria",
    "Microsoft.VSTS.TCM.ReproSteps",
    "Microsoft.VSTS.TCM.SystemInfo",
    "Microsoft.VSTS.CMMI.Analysis",
    "Microsoft.VSTS.CMMI.Mitigation",
    "Microsoft.VSTS.CMMI.ContingencyPlan",
];

/// Effort and sizing fields; non-negative numbers only.
pub const EFFORT_FIELDS: &[&str] = &[
    "Microsoft.VSTS.Scheduling.RemainingWork",
    "Microsoft.VSTS.Scheduling.CompletedWork",
    "Microsoft.VSTS.Scheduling.OriginalEstimate",
    "Microsoft.VSTS.Scheduling.StoryPoints",
    "Microsoft.VSTS.Scheduling.Effort",
    "Microsoft.VSTS.Scheduling.Size",
    "Microsoft.VSTS.Common.BusinessValue",
    "Microsoft.VSTS.Common.TimeCriticality",
    "Microsoft.VSTS.Common.BacklogPriority",
    "Microsoft.VSTS.Common.StackRank",
];

/// Fields holding a 1-4 rank.
pub const RANK_FIELDS: &[&str] = &[
    "Microsoft.VSTS.Common.Priority",
    "Microsoft.VSTS.Common.Severity",
];

pub const ALLOWED_LINK_TYPES: &[&str] = &[
    "System.LinkTypes.Hierarchy-Forward",
    "System.LinkTypes.Hierarchy-Reverse",
    "System.LinkTypes.Related",
    "System.LinkTypes.Dependency-Forward",
    "System.LinkTypes.Dependency-Reverse",
    "System.LinkTypes.Duplicate-Forward",
    "System.LinkTypes.Duplicate-Reverse",
    "System.LinkTypes.Successor",
    "System.LinkTypes.Predecessor",
    "System.LinkTypes.Child",
    "System.LinkTypes.Parent",
    "System.LinkTypes.Affects",
    "System.LinkTypes.AffectedBy",
];

/// Characters that cannot appear in a project or team name.
pub const FORBIDDEN_NAME_CHARS: &[char] = &[
    '\\', '/', ':', '*', '?', '"', '\'', '<', '>', '|', ';', '#', '$', '{', '}', ',', '+', '=',
    '[', ']', '%', '&',
];
